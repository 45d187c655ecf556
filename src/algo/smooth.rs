//! Mesh smoothing.
//!
//! Two filters on the uniform (umbrella) Laplacian `Δx_i = avg(x_j) - x_i`:
//!
//! - [`windowed_sinc_smooth`]: Taubin's polynomial low-pass filter with a
//!   Hamming window. Removes high-frequency noise with almost no shrinkage.
//!   This is the default used between flow iterations.
//! - [`laplacian_smooth`]: plain umbrella smoothing, `x ← x + λ·Δx`. Cheap,
//!   shrinks closed surfaces.
//!
//! Both keep the topology of their input and classify vertices first:
//!
//! - *free* vertices average over their whole one-ring;
//! - *constrained* vertices sit on exactly two boundary, feature or
//!   non-manifold edges and average over those two neighbors only;
//! - *fixed* vertices (corners, or boundaries with boundary smoothing off)
//!   do not move.
//!
//! # References
//!
//! - Taubin, G., Zhang, T., & Golub, G. (1996). "Optimal Surface Smoothing as
//!   Filter Design." ECCV.
//!
//! # Example
//!
//! ```
//! use ovoid::algo::smooth::{smooth, SmoothOptions};
//! use ovoid::mesh::primitives::icosphere;
//!
//! let sphere = icosphere(2, 1.0);
//! let options = SmoothOptions::default().with_iterations(10).with_pass_band(0.1);
//! let smoothed = smooth(&sphere, &options).unwrap();
//! assert_eq!(smoothed.num_vertices(), sphere.num_vertices());
//! ```

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::{OvoidError, Result};
use crate::mesh::{EdgeTopology, TriMesh};

/// Newton iterations allowed when placing the pass band.
const MAX_PASS_BAND_ITERATIONS: usize = 500;

/// Acceptable error of the filter response at the pass-band frequency.
const PASS_BAND_TOLERANCE: f64 = 1e-3;

/// Smoothing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothMethod {
    /// Windowed-sinc low-pass filter.
    #[default]
    WindowedSinc,
    /// Uniform Laplacian smoothing.
    Laplacian,
}

/// Options for mesh smoothing.
#[derive(Debug, Clone)]
pub struct SmoothOptions {
    /// Which filter to apply.
    pub method: SmoothMethod,

    /// Number of iterations (the polynomial degree for the windowed sinc).
    pub iterations: usize,

    /// Pass-band frequency in (0, 2]. Lower values smooth more.
    /// Used by the windowed-sinc filter.
    pub pass_band: f64,

    /// Step size in [0, 1] for Laplacian smoothing.
    pub lambda: f64,

    /// Whether boundary vertices may move (along the boundary).
    pub boundary_smoothing: bool,

    /// Whether sharp edges are detected and their vertices constrained.
    pub feature_edge_smoothing: bool,

    /// Dihedral angle in degrees above which an edge is a feature.
    pub feature_angle: f64,

    /// Whether non-manifold vertices move freely. When off they are
    /// constrained to their non-manifold edges.
    pub non_manifold_smoothing: bool,

    /// Whether to map coordinates into a unit box around the origin while
    /// filtering. Improves conditioning of the Chebyshev recurrence.
    pub normalize_coordinates: bool,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            method: SmoothMethod::WindowedSinc,
            iterations: 20,
            pass_band: 0.1,
            lambda: 0.5,
            boundary_smoothing: false,
            feature_edge_smoothing: false,
            feature_angle: 45.0,
            non_manifold_smoothing: true,
            normalize_coordinates: true,
            parallel: true,
        }
    }
}

impl SmoothOptions {
    /// Set the filter.
    pub fn with_method(mut self, method: SmoothMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the pass-band frequency.
    pub fn with_pass_band(mut self, pass_band: f64) -> Self {
        self.pass_band = pass_band;
        self
    }

    /// Set the Laplacian step size (clamped to [0, 1]).
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda.clamp(0.0, 1.0);
        self
    }

    /// Set whether boundary vertices may move.
    pub fn with_boundary_smoothing(mut self, enabled: bool) -> Self {
        self.boundary_smoothing = enabled;
        self
    }

    /// Set whether feature edges constrain their vertices.
    pub fn with_feature_edge_smoothing(mut self, enabled: bool) -> Self {
        self.feature_edge_smoothing = enabled;
        self
    }

    /// Set the feature angle in degrees.
    pub fn with_feature_angle(mut self, degrees: f64) -> Self {
        self.feature_angle = degrees;
        self
    }

    /// Set whether non-manifold vertices move freely.
    pub fn with_non_manifold_smoothing(mut self, enabled: bool) -> Self {
        self.non_manifold_smoothing = enabled;
        self
    }

    /// Set whether coordinates are normalized while filtering.
    pub fn with_normalize_coordinates(mut self, enabled: bool) -> Self {
        self.normalize_coordinates = enabled;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.method == SmoothMethod::WindowedSinc
            && !(self.pass_band > 0.0 && self.pass_band <= 2.0)
        {
            return Err(OvoidError::invalid_param(
                "pass_band",
                self.pass_band,
                "must be in (0, 2]",
            ));
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(OvoidError::invalid_param("lambda", self.lambda, "must be in [0, 1]"));
        }
        if !(self.feature_angle.is_finite() && self.feature_angle >= 0.0) {
            return Err(OvoidError::invalid_param(
                "feature_angle",
                self.feature_angle,
                "must be a non-negative angle in degrees",
            ));
        }
        Ok(())
    }
}

/// Smooth `mesh` with the filter selected in `options`.
pub fn smooth(mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh> {
    match options.method {
        SmoothMethod::WindowedSinc => windowed_sinc_smooth(mesh, options),
        SmoothMethod::Laplacian => laplacian_smooth(mesh, options),
    }
}

/// Windowed-sinc low-pass smoothing.
///
/// Evaluates `Σ c_i·T_i(K)·x` where `T_i` are Chebyshev polynomials of the
/// filter matrix `K = I + ½Δ` and `c_i` are the Hamming-windowed coefficients
/// of an ideal low-pass filter whose pass band is shifted by a Newton search
/// so the response at `pass_band` equals one.
///
/// # Errors
///
/// [`OvoidError::InvalidParameter`] if the pass band is outside (0, 2].
pub fn windowed_sinc_smooth(mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh> {
    options.validate()?;
    if options.iterations == 0 || mesh.num_faces() == 0 {
        return Ok(mesh.clone());
    }

    let stencil = SmoothingStencil::new(mesh, options);
    let coefficients = windowed_sinc_coefficients(options.iterations, options.pass_band);
    let frame = CoordinateFrame::new(mesh, options.normalize_coordinates);

    let x0: Vec<Vector3<f64>> = mesh.positions().iter().map(|p| frame.forward(p)).collect();

    // T_1(K)x = x + ½Δx
    let mut previous = x0.clone();
    let mut current: Vec<Vector3<f64>> = stencil
        .deltas(&previous, options.parallel)
        .into_iter()
        .zip(&previous)
        .map(|(d, x)| x + 0.5 * d)
        .collect();

    let mut accumulated: Vec<Vector3<f64>> = previous
        .iter()
        .zip(&current)
        .map(|(t0, t1)| coefficients[0] * t0 + coefficients[1] * t1)
        .collect();

    for &c in &coefficients[2..] {
        // T_{k+1} = 2·K·T_k - T_{k-1}
        let deltas = stencil.deltas(&current, options.parallel);
        let next: Vec<Vector3<f64>> = current
            .iter()
            .zip(&previous)
            .zip(&deltas)
            .map(|((t1, t0), d)| 2.0 * (t1 + 0.5 * d) - t0)
            .collect();

        for (acc, t) in accumulated.iter_mut().zip(&next) {
            *acc += c * t;
        }
        previous = current;
        current = next;
    }

    let positions = mesh
        .positions()
        .iter()
        .zip(&accumulated)
        .enumerate()
        .map(|(v, (original, smoothed))| {
            if stencil.is_fixed(v) {
                *original
            } else {
                frame.inverse(smoothed)
            }
        })
        .collect();

    log::debug!(
        "windowed sinc: {} iterations, pass band {}, {} fixed vertices",
        options.iterations,
        options.pass_band,
        stencil.num_fixed()
    );
    mesh.with_positions(positions)
}

/// Uniform Laplacian smoothing.
///
/// Each iteration moves every non-fixed vertex by `λ` toward the average of
/// its smoothing neighbors. Shrinks closed surfaces.
pub fn laplacian_smooth(mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh> {
    options.validate()?;
    if options.iterations == 0 || options.lambda == 0.0 || mesh.num_faces() == 0 {
        return Ok(mesh.clone());
    }

    let stencil = SmoothingStencil::new(mesh, options);
    let mut positions: Vec<Vector3<f64>> = mesh.positions().iter().map(|p| p.coords).collect();

    for _ in 0..options.iterations {
        let deltas = stencil.deltas(&positions, options.parallel);
        for (x, d) in positions.iter_mut().zip(&deltas) {
            *x += options.lambda * d;
        }
    }

    mesh.with_positions(positions.into_iter().map(Point3::from).collect())
}

/// Filter coefficients `c_0..=c_n` for a degree-`n` windowed-sinc filter.
pub fn windowed_sinc_coefficients(n: usize, pass_band: f64) -> Vec<f64> {
    let n = n.max(1);
    let theta_pb = (1.0 - 0.5 * pass_band).clamp(-1.0, 1.0).acos();

    let weights: Vec<f64> = (0..=n)
        .map(|i| 0.54 + 0.46 * (i as f64 * PI / (n + 1) as f64).cos())
        .collect();

    let coefficients = |sigma: f64| -> Vec<f64> {
        let cutoff = theta_pb + sigma;
        (0..=n)
            .map(|i| {
                if i == 0 {
                    weights[0] * cutoff / PI
                } else {
                    2.0 * weights[i] * (i as f64 * cutoff).sin() / (i as f64 * PI)
                }
            })
            .collect()
    };

    // Response at the pass band as a function of the cutoff shift σ, and its
    // derivative. T_i(cos θ) = cos(iθ).
    let response = |sigma: f64| -> (f64, f64) {
        let cutoff = theta_pb + sigma;
        let mut value = weights[0] * cutoff / PI;
        let mut slope = weights[0] / PI;
        for i in 1..=n {
            let t = (i as f64 * theta_pb).cos();
            let k = i as f64;
            value += 2.0 * weights[i] * (k * cutoff).sin() / (k * PI) * t;
            slope += 2.0 * weights[i] * (k * cutoff).cos() / PI * t;
        }
        (value, slope)
    };

    let mut sigma = 0.0;
    let mut best = (f64::INFINITY, 0.0);
    for _ in 0..MAX_PASS_BAND_ITERATIONS {
        let (value, slope) = response(sigma);
        let error = (value - 1.0).abs();
        if error < best.0 {
            best = (error, sigma);
        }
        if error < PASS_BAND_TOLERANCE || slope.abs() < f64::EPSILON {
            break;
        }
        sigma = (sigma - (value - 1.0) / slope).clamp(-theta_pb, PI - theta_pb);
    }

    if best.0 >= PASS_BAND_TOLERANCE {
        log::warn!(
            "windowed sinc: pass band search stopped with response error {:.2e}",
            best.0
        );
    }

    coefficients(best.1)
}

/// Evaluate the filter `Σ c_i·T_i(1 - k/2)` at frequency `k` in [0, 2].
pub fn filter_response(coefficients: &[f64], k: f64) -> f64 {
    let theta = (1.0 - 0.5 * k).clamp(-1.0, 1.0).acos();
    coefficients
        .iter()
        .enumerate()
        .map(|(i, c)| c * (i as f64 * theta).cos())
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexClass {
    Free,
    Constrained,
    Fixed,
}

/// Per-vertex smoothing neighbors after classification.
struct SmoothingStencil {
    neighbors: Vec<Vec<usize>>,
    classes: Vec<VertexClass>,
}

impl SmoothingStencil {
    fn new(mesh: &TriMesh, options: &SmoothOptions) -> Self {
        let topology = EdgeTopology::new(mesh);
        let n = mesh.num_vertices();
        let feature_angle = options.feature_angle.to_radians();

        let mut edge_neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut fixed = vec![false; n];

        for ((a, b), faces) in topology.edges() {
            let constraining = match faces.len() {
                1 => {
                    if !options.boundary_smoothing {
                        fixed[a] = true;
                        fixed[b] = true;
                    }
                    true
                }
                2 => {
                    options.feature_edge_smoothing
                        && topology
                            .dihedral_angle(mesh, a, b)
                            .is_some_and(|angle| angle > feature_angle)
                }
                _ => !options.non_manifold_smoothing,
            };
            if constraining {
                edge_neighbors[a].push(b);
                edge_neighbors[b].push(a);
            }
        }

        let mut neighbors = Vec::with_capacity(n);
        let mut classes = Vec::with_capacity(n);
        for v in 0..n {
            let edges = &mut edge_neighbors[v];
            edges.sort_unstable();
            edges.dedup();

            let (class, ring) = if fixed[v] || topology.neighbors(v).is_empty() {
                (VertexClass::Fixed, Vec::new())
            } else {
                match edges.len() {
                    0 => (VertexClass::Free, topology.neighbors(v).to_vec()),
                    2 => (VertexClass::Constrained, std::mem::take(edges)),
                    _ => (VertexClass::Fixed, Vec::new()),
                }
            };
            classes.push(class);
            neighbors.push(ring);
        }

        Self { neighbors, classes }
    }

    #[inline]
    fn is_fixed(&self, v: usize) -> bool {
        self.classes[v] == VertexClass::Fixed
    }

    fn num_fixed(&self) -> usize {
        self.classes.iter().filter(|&&c| c == VertexClass::Fixed).count()
    }

    /// `avg(x_j) - x_i` over the smoothing neighbors; zero for fixed vertices.
    fn deltas(&self, x: &[Vector3<f64>], parallel: bool) -> Vec<Vector3<f64>> {
        let delta = |v: usize| {
            let ring = &self.neighbors[v];
            if ring.is_empty() {
                return Vector3::zeros();
            }
            let sum: Vector3<f64> = ring.iter().map(|&j| x[j]).sum();
            sum / ring.len() as f64 - x[v]
        };

        if parallel {
            (0..x.len()).into_par_iter().map(delta).collect()
        } else {
            (0..x.len()).map(delta).collect()
        }
    }
}

/// Affine map into a box of unit extent centred at the origin.
struct CoordinateFrame {
    center: Vector3<f64>,
    scale: f64,
}

impl CoordinateFrame {
    fn new(mesh: &TriMesh, enabled: bool) -> Self {
        let identity = Self {
            center: Vector3::zeros(),
            scale: 1.0,
        };
        if !enabled {
            return identity;
        }
        match mesh.bounding_box() {
            Some((min, max)) => {
                let extent = (max - min).max();
                if extent > 0.0 && extent.is_finite() {
                    Self {
                        center: (min.coords + max.coords) * 0.5,
                        scale: extent,
                    }
                } else {
                    identity
                }
            }
            None => identity,
        }
    }

    #[inline]
    fn forward(&self, p: &Point3<f64>) -> Vector3<f64> {
        (p.coords - self.center) / self.scale
    }

    #[inline]
    fn inverse(&self, x: &Vector3<f64>) -> Point3<f64> {
        Point3::from(x * self.scale + self.center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::{icosahedron, icosphere};
    use approx::assert_relative_eq;

    fn noisy_sphere() -> TriMesh {
        let sphere = icosphere(3, 1.0);
        let positions = sphere
            .positions()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let noise = 0.03 * ((i as f64 * 12.9898).sin() * 43758.5453).fract();
                p * (1.0 + noise)
            })
            .collect();
        sphere.with_positions(positions).unwrap()
    }

    fn radius_spread(mesh: &TriMesh) -> (f64, f64) {
        let radii: Vec<f64> = mesh.positions().iter().map(|p| p.coords.norm()).collect();
        let mean = radii.iter().sum::<f64>() / radii.len() as f64;
        let var = radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / radii.len() as f64;
        (mean, var.sqrt())
    }

    fn grid(n: usize) -> TriMesh {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let z = if (i + j) % 2 == 0 { 0.05 } else { -0.05 };
                vertices.push(Point3::new(i as f64, j as f64, z));
            }
        }
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                faces.push([v00, v00 + 1, v00 + n + 2]);
                faces.push([v00, v00 + n + 2, v00 + n + 1]);
            }
        }
        TriMesh::new(vertices, faces).unwrap()
    }

    fn cube() -> TriMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [0, 4, 7],
            [0, 7, 3],
        ];
        TriMesh::new(vertices, faces).unwrap()
    }

    #[test]
    fn test_coefficients_hit_pass_band() {
        let c = windowed_sinc_coefficients(20, 0.1);
        assert_eq!(c.len(), 21);
        assert!((filter_response(&c, 0.1) - 1.0).abs() < 0.01);
        assert!(filter_response(&c, 1.5).abs() < 0.05);
    }

    #[test]
    fn test_windowed_sinc_removes_noise_without_shrinking() {
        let mesh = noisy_sphere();
        let (mean_before, spread_before) = radius_spread(&mesh);

        let options = SmoothOptions::default().with_iterations(20).with_pass_band(0.1);
        let smoothed = windowed_sinc_smooth(&mesh, &options).unwrap();
        let (mean_after, spread_after) = radius_spread(&smoothed);

        assert!(smoothed.shares_topology(&mesh));
        assert!(spread_after < 0.6 * spread_before, "{} vs {}", spread_after, spread_before);
        assert!((mean_after - mean_before).abs() / mean_before < 0.02);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mesh = noisy_sphere();
        let options = SmoothOptions::default().with_iterations(8);
        let a = smooth(&mesh, &options).unwrap();
        let b = smooth(&mesh, &options.clone().sequential()).unwrap();
        for (p, q) in a.positions().iter().zip(b.positions()) {
            assert_relative_eq!(p, q, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_boundary_fixed_by_default() {
        let mesh = grid(6);
        let smoothed = smooth(&mesh, &SmoothOptions::default()).unwrap();
        let topo = EdgeTopology::new(&mesh);

        let mut boundary = vec![false; mesh.num_vertices()];
        for (a, b) in topo.boundary_edges() {
            boundary[a] = true;
            boundary[b] = true;
        }

        let mut interior_moved = false;
        for v in 0..mesh.num_vertices() {
            if boundary[v] {
                assert_eq!(mesh.position(v), smoothed.position(v));
            } else if (mesh.position(v) - smoothed.position(v)).norm() > 1e-6 {
                interior_moved = true;
            }
        }
        assert!(interior_moved);
    }

    #[test]
    fn test_boundary_smoothing_moves_boundary() {
        let mesh = grid(6);
        let options = SmoothOptions::default().with_boundary_smoothing(true);
        let smoothed = smooth(&mesh, &options).unwrap();
        // Vertex 1 lies on the bottom edge between two boundary neighbors.
        assert!((mesh.position(1) - smoothed.position(1)).norm() > 1e-6);
    }

    #[test]
    fn test_feature_edges_pin_cube_corners() {
        let mesh = cube();
        let options = SmoothOptions::default().with_feature_edge_smoothing(true);
        let smoothed = smooth(&mesh, &options).unwrap();
        assert_eq!(smoothed.positions(), mesh.positions());

        let free = smooth(&mesh, &SmoothOptions::default()).unwrap();
        assert_ne!(free.positions(), mesh.positions());
    }

    #[test]
    fn test_laplacian_shrinks_closed_mesh() {
        let mesh = icosahedron(1.0);
        let options = SmoothOptions::default()
            .with_method(SmoothMethod::Laplacian)
            .with_iterations(5)
            .with_lambda(0.5);
        let smoothed = smooth(&mesh, &options).unwrap();
        assert!(smoothed.volume() < mesh.volume());
    }

    #[test]
    fn test_zero_iterations_no_change() {
        let mesh = noisy_sphere();
        for method in [SmoothMethod::WindowedSinc, SmoothMethod::Laplacian] {
            let options = SmoothOptions::default().with_method(method).with_iterations(0);
            assert_eq!(smooth(&mesh, &options).unwrap(), mesh);
        }
    }

    #[test]
    fn test_rejects_bad_pass_band() {
        let mesh = icosahedron(1.0);
        for pb in [0.0, -0.1, 2.5, f64::NAN] {
            let options = SmoothOptions::default().with_pass_band(pb);
            assert!(matches!(
                smooth(&mesh, &options),
                Err(OvoidError::InvalidParameter { name: "pass_band", .. })
            ));
        }
    }
}
