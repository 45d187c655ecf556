//! Geometry collaborators of the flow loop.
//!
//! The controller never calls the smoothing, cleaning, volume or distance
//! algorithms directly; it goes through a [`GeometryBackend`]. [`NativeBackend`]
//! wires the implementations in [`crate::algo`]. Other implementations can
//! substitute a different smoother or an accelerated distance query without
//! touching the loop.

use crate::algo::clean::{self, CleanOptions};
use crate::algo::distance::{DistanceField, TriangleDistanceField};
use crate::algo::smooth::{self, SmoothOptions};
use crate::error::Result;
use crate::mesh::TriMesh;

/// Smoothing, cleaning, volume and distance queries used by the flow loop.
pub trait GeometryBackend: Send + Sync {
    /// Smooth `mesh`, returning a mesh with the same topology.
    fn smooth(&self, mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh>;

    /// Merge near-duplicate vertices. The result may have fewer vertices and faces.
    fn clean(&self, mesh: &TriMesh, options: &CleanOptions) -> Result<TriMesh>;

    /// Enclosed volume of a closed mesh.
    fn volume(&self, mesh: &TriMesh) -> f64;

    /// A distance field for queries against `surface`.
    fn distance_field(&self, surface: &TriMesh) -> Result<Box<dyn DistanceField>>;
}

/// The built-in backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl GeometryBackend for NativeBackend {
    fn smooth(&self, mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh> {
        smooth::smooth(mesh, options)
    }

    fn clean(&self, mesh: &TriMesh, options: &CleanOptions) -> Result<TriMesh> {
        clean::clean(mesh, options)
    }

    fn volume(&self, mesh: &TriMesh) -> f64 {
        mesh.volume()
    }

    fn distance_field(&self, surface: &TriMesh) -> Result<Box<dyn DistanceField>> {
        Ok(Box::new(TriangleDistanceField::new(surface)?))
    }
}

impl<B: GeometryBackend + ?Sized> GeometryBackend for &B {
    fn smooth(&self, mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh> {
        (**self).smooth(mesh, options)
    }

    fn clean(&self, mesh: &TriMesh, options: &CleanOptions) -> Result<TriMesh> {
        (**self).clean(mesh, options)
    }

    fn volume(&self, mesh: &TriMesh) -> f64 {
        (**self).volume(mesh)
    }

    fn distance_field(&self, surface: &TriMesh) -> Result<Box<dyn DistanceField>> {
        (**self).distance_field(surface)
    }
}
