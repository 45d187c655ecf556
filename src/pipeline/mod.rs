//! The iterative flow loop.
//!
//! [`FlowController`] drives one iteration at a time:
//!
//! 1. implicit mean curvature flow step with the Laplacian of the input mesh
//!    and the mass matrix of the current mesh
//! 2. normalization to unit area and zero area-weighted centroid
//! 3. smoothing and cleaning through the [`GeometryBackend`]
//! 4. volume-matched ellipsoid fit and tessellation
//! 5. deviation of the flowed vertices from the ellipsoid surface
//! 6. hand-off of an [`IterationRecord`] to the [`ArtifactSink`]
//!
//! and then stops on convergence or an exhausted iteration budget.
//!
//! # Example
//!
//! ```
//! use ovoid::pipeline::{FlowConfig, FlowController, FlowState, MemorySink};
//! use ovoid::backend::NativeBackend;
//! use ovoid::mesh::primitives::icosphere;
//!
//! let config = FlowConfig::new(0.001).with_max_iterations(5);
//! let mut controller =
//!     FlowController::new(icosphere(2, 1.0), config, NativeBackend, MemorySink::new()).unwrap();
//!
//! let outcome = controller.run().unwrap();
//! assert_eq!(outcome.state, FlowState::Converged);
//! assert_eq!(controller.sink().records().len(), outcome.iterations);
//! ```
//!
//! [`GeometryBackend`]: crate::backend::GeometryBackend

mod config;
mod controller;
mod sink;

use std::fmt;

pub use config::{DeviationSource, FlowConfig, VolumeSource};
pub use controller::{FlowController, FlowOutcome, FlowState, IterationRecord};
pub use sink::{ArtifactSink, FileSink, MemorySink};

/// A stage of one flow iteration, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Laplacian and mass matrix assembly.
    Operators,
    /// Implicit flow solve.
    Flow,
    /// Area and centroid normalization.
    Normalize,
    /// Smoothing.
    Smooth,
    /// Vertex merging.
    Clean,
    /// Ellipsoid fit and tessellation.
    Fit,
    /// Distance evaluation.
    Deviation,
    /// Artifact output.
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Operators => "operator assembly",
            Stage::Flow => "flow solve",
            Stage::Normalize => "normalization",
            Stage::Smooth => "smoothing",
            Stage::Clean => "cleaning",
            Stage::Fit => "ellipsoid fit",
            Stage::Deviation => "deviation",
            Stage::Sink => "artifact output",
        };
        f.write_str(name)
    }
}
