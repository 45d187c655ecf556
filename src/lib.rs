//! # Ovoid
//!
//! Mean curvature flow of closed triangle meshes toward their best-fitting
//! ellipsoid.
//!
//! Ovoid repeatedly applies an implicit mean curvature flow step to a mesh,
//! renormalises it to unit area, fits a volume-matched ellipsoid to a smoothed
//! and cleaned copy, and measures how far the flowed surface lies from that
//! ellipsoid. The loop stops once a high quantile of the distances falls below
//! a threshold, giving a measure of how "ellipsoidal" the input shape is.
//!
//! ## Features
//!
//! - **Discrete operators**: cotangent Laplacian and barycentric mass matrix
//! - **Implicit flow**: sparse Cholesky solve of `(M - dt·L) x = M·x₀`
//! - **Smoothing**: windowed-sinc low-pass filter and Laplacian smoothing
//! - **Ellipsoid fitting**: principal axes with volume matching
//! - **Multiple file formats**: OFF, VTK, PLY, STL, glTF
//!
//! ## Quick Start
//!
//! ```no_run
//! use ovoid::prelude::*;
//!
//! let mesh = ovoid::io::load("bunny.off").unwrap();
//! let config = FlowConfig::new(0.001).with_max_iterations(50);
//!
//! let mut controller =
//!     FlowController::new(mesh, config, NativeBackend, MemorySink::default()).unwrap();
//! let outcome = controller.run().unwrap();
//!
//! println!("{:?} after {} iterations", outcome.state, outcome.iterations);
//! ```
//!
//! ## Running Single Stages
//!
//! ```
//! use ovoid::prelude::*;
//! use ovoid::algo::{flow, normalize};
//! use ovoid::mesh::primitives::icosphere;
//!
//! let sphere = icosphere(2, 1.0);
//! let laplacian = CotanLaplacian::new(&sphere).unwrap();
//! let mass = MassMatrix::barycentric(&sphere).unwrap();
//!
//! let flowed = flow::implicit_step(&laplacian, &mass, &sphere, 0.01).unwrap();
//! let unit = normalize::normalize(&flowed).unwrap();
//! assert!((unit.mesh.surface_area() - 1.0).abs() < 1e-9);
//!
//! let fit = EllipsoidFit::fit(unit.mesh.positions(), unit.mesh.volume()).unwrap();
//! assert!((fit.radii[0] - fit.radii[2]).abs() < 1e-2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod backend;
pub mod error;
pub mod io;
pub mod mesh;
pub mod pipeline;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use ovoid::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::clean::CleanOptions;
    pub use crate::algo::deviation::Deviation;
    pub use crate::algo::distance::{DistanceField, TriangleDistanceField};
    pub use crate::algo::ellipsoid::EllipsoidFit;
    pub use crate::algo::operators::{CotanLaplacian, MassMatrix};
    pub use crate::algo::smooth::{SmoothMethod, SmoothOptions};
    pub use crate::backend::{GeometryBackend, NativeBackend};
    pub use crate::error::{OvoidError, Result};
    pub use crate::mesh::{EdgeTopology, TriMesh};
    pub use crate::pipeline::{
        ArtifactSink, DeviationSource, FileSink, FlowConfig, FlowController, FlowOutcome,
        FlowState, IterationRecord, MemorySink, Stage, VolumeSource,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = vec![
            [0, 2, 1], // bottom
            [0, 1, 3], // front
            [1, 2, 3], // right
            [2, 0, 3], // left
        ];

        let mesh = TriMesh::new(vertices, faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 4);
        assert!(EdgeTopology::new(&mesh).is_closed_manifold());

        // Outward winding: base area 0.5, height 1.
        assert!((mesh.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
    }
}
