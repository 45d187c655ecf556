//! Area and position normalization.
//!
//! Mean curvature flow shrinks a closed surface toward a point. After every
//! step the mesh is recentred on its area-weighted centroid and rescaled to
//! unit surface area so successive iterations stay comparable.

use nalgebra::{Point3, Vector3};

use crate::error::{OvoidError, Result};
use crate::mesh::TriMesh;

/// A normalized mesh together with the transform that was removed.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Mesh centred at the origin with unit surface area.
    pub mesh: TriMesh,
    /// Surface area before rescaling.
    pub area: f64,
    /// Area-weighted centroid before recentring.
    pub centroid: Point3<f64>,
}

impl Normalized {
    /// Scale factor that was applied to every coordinate.
    #[inline]
    pub fn scale(&self) -> f64 {
        1.0 / self.area.sqrt()
    }
}

/// Recentre `mesh` on its area-weighted centroid and rescale it to unit area.
///
/// The centroid is the average of face barycenters weighted by face area.
///
/// # Errors
///
/// - [`OvoidError::EmptyMesh`] if the mesh has no faces.
/// - [`OvoidError::DegenerateArea`] if the total area is not positive and finite.
pub fn normalize(mesh: &TriMesh) -> Result<Normalized> {
    if mesh.num_faces() == 0 {
        return Err(OvoidError::EmptyMesh);
    }

    let mut area = 0.0;
    let mut weighted = Vector3::zeros();
    for f in 0..mesh.num_faces() {
        let a = mesh.face_area(f);
        area += a;
        weighted += mesh.face_barycenter(f).coords * a;
    }

    if !(area.is_finite() && area > 0.0) {
        return Err(OvoidError::DegenerateArea { area });
    }

    let centroid = Point3::from(weighted / area);
    let scale = 1.0 / area.sqrt();

    let positions = mesh
        .positions()
        .iter()
        .map(|p| Point3::from((p - centroid) * scale))
        .collect();

    Ok(Normalized {
        mesh: mesh.with_positions(positions)?,
        area,
        centroid,
    })
}
