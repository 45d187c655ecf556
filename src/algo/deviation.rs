//! Quantile deviation between a point set and a surface.
//!
//! The convergence scalar of the flow is a high quantile of the per-vertex
//! distances from the flowed mesh to its fitted ellipsoid. A quantile rather
//! than the maximum keeps a handful of badly placed vertices from stalling
//! convergence.

use nalgebra::Point3;
use rayon::prelude::*;

use crate::algo::distance::DistanceField;
use crate::error::{OvoidError, Result};

/// Below this many samples the quantile is coarse and a warning is logged.
const COARSE_SAMPLE_COUNT: usize = 20;

/// Distance statistics of a point set against a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    /// The quantile statistic used for convergence.
    pub statistic: f64,
    /// Quantile the statistic was taken at.
    pub quantile: f64,
    /// Largest distance.
    pub max: f64,
    /// Mean distance.
    pub mean: f64,
    /// Number of points measured.
    pub samples: usize,
}

/// Measure the distances of `points` to `field`.
///
/// The statistic is the sorted distance at index `floor(quantile · n)`,
/// clamped to the last element.
///
/// # Errors
///
/// - [`OvoidError::InsufficientPoints`] if `points` is empty.
/// - [`OvoidError::InvalidParameter`] if `quantile` is outside (0, 1).
/// - [`OvoidError::NonFiniteSolution`] if any distance is NaN or infinite.
pub fn evaluate(
    field: &dyn DistanceField,
    points: &[Point3<f64>],
    quantile: f64,
    parallel: bool,
) -> Result<Deviation> {
    if !(quantile > 0.0 && quantile < 1.0) {
        return Err(OvoidError::invalid_param("quantile", quantile, "must be in (0, 1)"));
    }
    if points.is_empty() {
        return Err(OvoidError::InsufficientPoints {
            required: 1,
            actual: 0,
        });
    }
    if points.len() < COARSE_SAMPLE_COUNT {
        log::warn!(
            "deviation: only {} samples, the {} quantile is coarse",
            points.len(),
            quantile
        );
    }

    let mut distances: Vec<f64> = if parallel {
        points.par_iter().map(|p| field.distance(p)).collect()
    } else {
        points.iter().map(|p| field.distance(p)).collect()
    };

    if distances.iter().any(|d| !d.is_finite()) {
        return Err(OvoidError::NonFiniteSolution {
            context: "surface distance",
        });
    }

    let statistic = quantile_of(&mut distances, quantile);
    let n = distances.len();
    let max = distances[n - 1];
    let mean = distances.iter().sum::<f64>() / n as f64;

    Ok(Deviation {
        statistic,
        quantile,
        max,
        mean,
        samples: n,
    })
}

/// Sort `values` and return the element at `floor(quantile · n)`, clamped.
///
/// `values` must be non-empty.
pub fn quantile_of(values: &mut [f64], quantile: f64) -> f64 {
    values.sort_by(f64::total_cmp);
    let index = ((quantile * values.len() as f64).floor() as usize).min(values.len() - 1);
    values[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::distance::TriangleDistanceField;
    use crate::mesh::primitives::icosphere;
    use approx::assert_relative_eq;

    /// Distance to the origin minus one: the unit sphere.
    struct UnitSphere;

    impl DistanceField for UnitSphere {
        fn signed_distance(&self, point: &Point3<f64>) -> f64 {
            point.coords.norm() - 1.0
        }
    }

    fn shell(n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let r = 1.0 + i as f64 / n as f64;
                let t = i as f64 * 2.399;
                Point3::new(r * t.cos(), r * t.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_quantile_index() {
        let mut values: Vec<f64> = (0..100).rev().map(|i| i as f64).collect();
        assert_eq!(quantile_of(&mut values, 0.95), 95.0);
        assert_eq!(quantile_of(&mut values, 0.999), 99.0);
        assert_eq!(quantile_of(&mut [3.0], 0.95), 3.0);
    }

    #[test]
    fn test_statistics() {
        let points = shell(100);
        let dev = evaluate(&UnitSphere, &points, 0.95, false).unwrap();
        assert_eq!(dev.samples, 100);
        assert_relative_eq!(dev.statistic, 0.95, epsilon = 1e-12);
        assert_relative_eq!(dev.max, 0.99, epsilon = 1e-12);
        assert_relative_eq!(dev.mean, 0.495, epsilon = 1e-12);
    }

    #[test]
    fn test_permutation_invariant() {
        let points = shell(57);
        let mut shuffled = points.clone();
        shuffled.reverse();
        shuffled.swap(3, 40);
        shuffled.rotate_left(11);

        let a = evaluate(&UnitSphere, &points, 0.9, true).unwrap();
        let b = evaluate(&UnitSphere, &shuffled, 0.9, false).unwrap();
        assert_eq!(a.statistic, b.statistic);
        assert_eq!(a.max, b.max);
    }

    #[test]
    fn test_mesh_against_itself_is_zero() {
        let sphere = icosphere(2, 1.0);
        let field = TriangleDistanceField::new(&sphere).unwrap();
        let dev = evaluate(&field, sphere.positions(), 0.95, true).unwrap();
        assert!(dev.statistic < 1e-12);
        assert!(dev.max < 1e-12);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(
            evaluate(&UnitSphere, &[], 0.95, false),
            Err(OvoidError::InsufficientPoints { .. })
        ));
        for q in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                evaluate(&UnitSphere, &shell(10), q, false),
                Err(OvoidError::InvalidParameter { name: "quantile", .. })
            ));
        }
    }

    #[test]
    fn test_nan_distance_reported() {
        let points = vec![Point3::new(f64::NAN, 0.0, 0.0); 30];
        assert!(matches!(
            evaluate(&UnitSphere, &points, 0.5, false),
            Err(OvoidError::NonFiniteSolution { .. })
        ));
    }
}
