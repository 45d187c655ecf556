//! Principal-axis ellipsoid fitting.
//!
//! The fit is a second-moment (PCA) fit: the eigenvectors of the centered
//! scatter matrix give the axes, the square roots of its eigenvalues give the
//! axis proportions, and a uniform scale matches a prescribed volume.
//!
//! # Example
//!
//! ```
//! use ovoid::algo::ellipsoid::EllipsoidFit;
//! use ovoid::mesh::primitives::uv_ellipsoid;
//! use nalgebra::Vector3;
//!
//! let mesh = uv_ellipsoid(&Vector3::new(3.0, 2.0, 1.0), 40, 40);
//! let fit = EllipsoidFit::fit(mesh.positions(), mesh.volume()).unwrap();
//!
//! assert!(fit.radii.x > fit.radii.y && fit.radii.y > fit.radii.z);
//! assert!((fit.volume() - mesh.volume()).abs() < 1e-9);
//! ```

use std::f64::consts::PI;

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use crate::error::{OvoidError, Result};
use crate::mesh::primitives::uv_ellipsoid;
use crate::mesh::TriMesh;

/// Smallest-to-largest eigenvalue ratio below which the cloud is flat.
const DEGENERATE_RATIO: f64 = 1e-12;

/// Relative eigenvalue gap below which two axes are interchangeable.
const AMBIGUOUS_GAP: f64 = 1e-6;

/// A volume-matched principal-axis ellipsoid.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipsoidFit {
    /// Center of the ellipsoid (centroid of the fitted points).
    pub centroid: Point3<f64>,
    /// Proper rotation whose columns are the principal axes, major first.
    pub rotation: Matrix3<f64>,
    /// Volume-matched semi-axis lengths, major first.
    pub radii: Vector3<f64>,
    /// Semi-axes before volume matching (square roots of the eigenvalues).
    pub raw_radii: Vector3<f64>,
    /// Uniform factor applied to `raw_radii`.
    pub scale: f64,
    /// Set when two eigenvalues coincide, making their axes arbitrary.
    pub axes_ambiguous: bool,
}

impl EllipsoidFit {
    /// Fit the principal-axis ellipsoid of `points` with volume `target_volume`.
    ///
    /// # Errors
    ///
    /// - [`OvoidError::InsufficientPoints`] for fewer than four points.
    /// - [`OvoidError::InvalidVolume`] if the target is not positive and finite.
    /// - [`OvoidError::DegenerateScatter`] if the points are (numerically)
    ///   coplanar, collinear or coincident.
    pub fn fit(points: &[Point3<f64>], target_volume: f64) -> Result<Self> {
        if points.len() < 4 {
            return Err(OvoidError::InsufficientPoints {
                required: 4,
                actual: points.len(),
            });
        }
        if !(target_volume.is_finite() && target_volume > 0.0) {
            return Err(OvoidError::InvalidVolume {
                volume: target_volume,
            });
        }

        let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
        let centroid = Point3::from(sum / points.len() as f64);

        let mut scatter = Matrix3::zeros();
        for p in points {
            let d = p - centroid;
            scatter += d * d.transpose();
        }

        let eigen = SymmetricEigen::new(scatter);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let eigenvalues = order.map(|i| eigen.eigenvalues[i]);
        let [l0, l1, l2] = eigenvalues;
        if !(l0 > 0.0 && l2 > DEGENERATE_RATIO * l0) {
            return Err(OvoidError::DegenerateScatter { eigenvalues });
        }

        let mut rotation = Matrix3::from_columns(&[
            eigen.eigenvectors.column(order[0]).into_owned(),
            eigen.eigenvectors.column(order[1]).into_owned(),
            eigen.eigenvectors.column(order[2]).into_owned(),
        ]);
        if rotation.determinant() < 0.0 {
            let flipped = -rotation.column(2);
            rotation.set_column(2, &flipped);
        }

        let axes_ambiguous = (l0 - l1) / l0 < AMBIGUOUS_GAP || (l1 - l2) / l0 < AMBIGUOUS_GAP;
        if axes_ambiguous {
            log::warn!(
                "ellipsoid fit: repeated eigenvalues {:?}, axis assignment is arbitrary",
                eigenvalues
            );
        }

        let raw_radii = Vector3::new(l0.sqrt(), l1.sqrt(), l2.sqrt());
        let raw_volume = ellipsoid_volume(&raw_radii);
        let scale = (target_volume / raw_volume).cbrt();

        Ok(Self {
            centroid,
            rotation,
            radii: raw_radii * scale,
            raw_radii,
            scale,
            axes_ambiguous,
        })
    }

    /// Enclosed volume of the fitted ellipsoid.
    pub fn volume(&self) -> f64 {
        ellipsoid_volume(&self.radii)
    }

    /// Principal axis `i` (0 = major).
    pub fn axis(&self, i: usize) -> Vector3<f64> {
        self.rotation.column(i).into_owned()
    }

    /// Coordinates of `p` in the ellipsoid frame.
    pub fn to_local(&self, p: &Point3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * (p - self.centroid)
    }

    /// `Σ (x_i / r_i)² - 1`: zero on the surface, negative inside.
    pub fn implicit_value(&self, p: &Point3<f64>) -> f64 {
        self.to_local(p).component_div(&self.radii).norm_squared() - 1.0
    }

    /// Closed tessellation of the ellipsoid in the frame of the fitted points.
    ///
    /// `u_res` longitude segments and `v_res` latitude bands, outward winding.
    pub fn surface(&self, u_res: usize, v_res: usize) -> TriMesh {
        let local = uv_ellipsoid(&self.radii, u_res, v_res);
        let (vertices, faces) = local.into_parts();
        let vertices = vertices
            .into_iter()
            .map(|p| self.centroid + self.rotation * p.coords)
            .collect();
        TriMesh::new_unchecked(vertices, faces)
    }
}

/// `4/3·π·a·b·c`.
#[inline]
pub fn ellipsoid_volume(radii: &Vector3<f64>) -> f64 {
    4.0 / 3.0 * PI * radii.x * radii.y * radii.z
}
