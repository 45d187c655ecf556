//! Near-duplicate vertex merging.
//!
//! Vertices closer than a tolerance are merged into the first vertex seen in
//! their neighborhood. Triangles that collapse (two corners merged) are
//! dropped, then vertices no longer referenced by any input triangle are
//! removed and indices compacted.
//!
//! Representatives depend on vertex order: relabeling the input can merge a
//! cluster onto a different point and so shift everything fitted downstream.
//!
//! The result is used only as a point set for ellipsoid fitting, so a cleaned
//! mesh may have fewer vertices and faces than its input.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::error::{OvoidError, Result};
use crate::mesh::TriMesh;

/// Options for vertex merging.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Merge distance. A fraction of the bounding box diagonal unless
    /// `absolute` is set.
    pub tolerance: f64,

    /// Interpret `tolerance` as a distance in model units.
    pub absolute: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            absolute: false,
        }
    }
}

impl CleanOptions {
    /// Set the merge tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Use an absolute tolerance.
    pub fn absolute(mut self) -> Self {
        self.absolute = true;
        self
    }

    /// Use a tolerance relative to the bounding box diagonal.
    pub fn relative(mut self) -> Self {
        self.absolute = false;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(OvoidError::invalid_param(
                "tolerance",
                self.tolerance,
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }

    /// Merge distance in model units for `mesh`.
    pub fn distance_for(&self, mesh: &TriMesh) -> f64 {
        if self.absolute {
            self.tolerance
        } else {
            self.tolerance * mesh.bounding_box_diagonal()
        }
    }
}

/// Merge vertices of `mesh` closer than the configured tolerance.
///
/// # Example
///
/// ```
/// use ovoid::algo::clean::{clean, CleanOptions};
/// use ovoid::mesh::TriMesh;
/// use nalgebra::Point3;
///
/// // Two triangles that should share an edge but carry duplicated vertices.
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let mesh = TriMesh::new(vertices, vec![[0, 1, 2], [3, 4, 5]]).unwrap();
///
/// let cleaned = clean(&mesh, &CleanOptions::default().with_tolerance(0.0)).unwrap();
/// assert_eq!(cleaned.num_vertices(), 4);
/// assert_eq!(cleaned.num_faces(), 2);
/// ```
pub fn clean(mesh: &TriMesh, options: &CleanOptions) -> Result<TriMesh> {
    options.validate()?;

    let tolerance = options.distance_for(mesh);
    let representative = if tolerance > 0.0 {
        merge_within(mesh.positions(), tolerance)
    } else {
        merge_exact(mesh.positions())
    };

    // Keep every representative an input face touches, even when that face
    // collapsed; a mesh without faces keeps all of them.
    let mut keep = vec![mesh.num_faces() == 0; mesh.num_vertices()];
    for face in mesh.faces() {
        for &v in face {
            keep[representative[v]] = true;
        }
    }

    let mut compact = vec![usize::MAX; mesh.num_vertices()];
    let mut vertices = Vec::new();
    for (v, p) in mesh.positions().iter().enumerate() {
        if keep[v] && representative[v] == v {
            compact[v] = vertices.len();
            vertices.push(*p);
        }
    }

    let mut faces = Vec::with_capacity(mesh.num_faces());
    for face in mesh.faces() {
        let [a, b, c] = face.map(|v| compact[representative[v]]);
        if a != b && b != c && a != c {
            faces.push([a, b, c]);
        }
    }

    let merged = mesh.num_vertices() - vertices.len();
    let dropped = mesh.num_faces() - faces.len();
    log::debug!(
        "clean: tolerance {:.3e}, removed {} vertices and {} faces",
        tolerance,
        merged,
        dropped
    );

    Ok(TriMesh::new_unchecked(vertices, faces))
}

/// For each vertex, the index of the first earlier vertex within `tolerance`
/// (itself if none).
fn merge_within(positions: &[Point3<f64>], tolerance: f64) -> Vec<usize> {
    let cell_size = tolerance;
    let tolerance_sq = tolerance * tolerance;

    let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    let mut representative = Vec::with_capacity(positions.len());

    for (v, p) in positions.iter().enumerate() {
        let cell = pos_to_cell(p, cell_size);

        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    // Cells saturate at the i64 range for tiny tolerances.
                    let key = (
                        cell.0.saturating_add(dx),
                        cell.1.saturating_add(dy),
                        cell.2.saturating_add(dz),
                    );
                    if let Some(candidates) = grid.get(&key) {
                        if let Some(&r) = candidates
                            .iter()
                            .find(|&&r| (positions[r] - p).norm_squared() <= tolerance_sq)
                        {
                            found = Some(r);
                            break 'search;
                        }
                    }
                }
            }
        }

        match found {
            Some(r) => representative.push(r),
            None => {
                grid.entry(cell).or_default().push(v);
                representative.push(v);
            }
        }
    }

    representative
}

/// Merge only bit-identical positions.
fn merge_exact(positions: &[Point3<f64>]) -> Vec<usize> {
    let mut seen: HashMap<[u64; 3], usize> = HashMap::with_capacity(positions.len());
    positions
        .iter()
        .enumerate()
        .map(|(v, p)| {
            // +0.0 and -0.0 are the same point.
            let key = [p.x + 0.0, p.y + 0.0, p.z + 0.0].map(f64::to_bits);
            *seen.entry(key).or_insert(v)
        })
        .collect()
}

fn pos_to_cell(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}
