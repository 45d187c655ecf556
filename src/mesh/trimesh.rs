//! Indexed triangle mesh.
//!
//! [`TriMesh`] is a plain face-vertex list: N positions and M triangles of
//! indices into them. The pipeline never edits a mesh in place; every stage
//! returns a new value, typically through [`TriMesh::with_positions`] which
//! shares the face list of its source.

use std::sync::Arc;

use nalgebra::{Point3, Vector3};

use crate::error::{OvoidError, Result};

/// An immutable triangle mesh.
///
/// The face list is reference counted so that same-topology copies produced
/// every iteration do not duplicate it.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    vertices: Vec<Point3<f64>>,
    faces: Arc<[[usize; 3]]>,
}

impl TriMesh {
    /// Build a mesh from positions and triangles.
    ///
    /// Every index must be below `vertices.len()` and no triangle may repeat a
    /// vertex. An empty face list is accepted (point clouds produced by
    /// cleaning); operations that need faces report [`OvoidError::EmptyMesh`].
    ///
    /// # Example
    ///
    /// ```
    /// use ovoid::mesh::TriMesh;
    /// use nalgebra::Point3;
    ///
    /// let mesh = TriMesh::new(
    ///     vec![
    ///         Point3::new(0.0, 0.0, 0.0),
    ///         Point3::new(1.0, 0.0, 0.0),
    ///         Point3::new(0.0, 1.0, 0.0),
    ///     ],
    ///     vec![[0, 1, 2]],
    /// )
    /// .unwrap();
    /// assert_eq!(mesh.num_faces(), 1);
    /// assert!((mesh.surface_area() - 0.5).abs() < 1e-12);
    /// ```
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        for (fi, face) in faces.iter().enumerate() {
            for &vi in face {
                if vi >= vertices.len() {
                    return Err(OvoidError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(OvoidError::DegenerateFace { face: fi });
            }
        }

        Ok(Self {
            vertices,
            faces: faces.into(),
        })
    }

    /// Build a mesh whose indices are valid by construction.
    pub(crate) fn new_unchecked(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        debug_assert!(faces.iter().flatten().all(|&v| v < vertices.len()));
        Self {
            vertices,
            faces: faces.into(),
        }
    }

    /// Build a mesh by copying positions and faces from slices.
    pub fn from_slices(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Self> {
        Self::new(vertices.to_vec(), faces.to_vec())
    }

    /// A new mesh with the same faces and the given positions.
    ///
    /// Returns [`OvoidError::InvalidState`] if the position count differs.
    pub fn with_positions(&self, vertices: Vec<Point3<f64>>) -> Result<Self> {
        if vertices.len() != self.vertices.len() {
            return Err(OvoidError::InvalidState(format!(
                "expected {} positions, got {}",
                self.vertices.len(),
                vertices.len()
            )));
        }
        Ok(Self {
            vertices,
            faces: Arc::clone(&self.faces),
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// All vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// All triangles.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Position of vertex `v`.
    #[inline]
    pub fn position(&self, v: usize) -> &Point3<f64> {
        &self.vertices[v]
    }

    /// Whether two meshes share the same face list allocation.
    pub fn shares_topology(&self, other: &TriMesh) -> bool {
        Arc::ptr_eq(&self.faces, &other.faces)
    }

    /// Positions of the three corners of face `f`.
    #[inline]
    pub fn face_positions(&self, f: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[f];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Twice the area of face `f`.
    pub fn face_double_area(&self, f: usize) -> f64 {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Area of face `f`.
    #[inline]
    pub fn face_area(&self, f: usize) -> f64 {
        0.5 * self.face_double_area(f)
    }

    /// Unit normal of face `f`, following the winding order.
    ///
    /// Zero for degenerate faces.
    pub fn face_normal(&self, f: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        let n = (p1 - p0).cross(&(p2 - p0));
        let len = n.norm();
        if len > 1e-300 {
            n / len
        } else {
            Vector3::zeros()
        }
    }

    /// Barycenter (corner average) of face `f`.
    pub fn face_barycenter(&self, f: usize) -> Point3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        Point3::from((p0.coords + p1.coords + p2.coords) / 3.0)
    }

    /// Total surface area.
    pub fn surface_area(&self) -> f64 {
        (0..self.num_faces()).map(|f| self.face_area(f)).sum()
    }

    /// Axis-aligned bounding box, or `None` without vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.vertices[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// Length of the bounding box diagonal (zero without vertices).
    pub fn bounding_box_diagonal(&self) -> f64 {
        self.bounding_box()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Mean of all vertex positions.
    pub fn vertex_centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.vertices.iter().map(|p| p.coords).sum();
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Signed enclosed volume by the divergence theorem.
    ///
    /// Positive for a closed mesh with outward winding, negative if it is
    /// inside out. Meaningless for open meshes.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for &[i0, i1, i2] in self.faces.iter() {
            let v0 = self.vertices[i0].coords;
            let v1 = self.vertices[i1].coords;
            let v2 = self.vertices[i2].coords;
            volume += v0.dot(&v1.cross(&v2));
        }
        volume / 6.0
    }

    /// Absolute enclosed volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Consume the mesh, returning positions and faces.
    pub fn into_parts(self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        (self.vertices, self.faces.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> TriMesh {
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
    fn test_rejects_out_of_range_index() {
        let vertices = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let err = TriMesh::new(vertices, vec![[0, 1, 2]]).unwrap_err();
        assert!(matches!(
            err,
            OvoidError::InvalidVertexIndex { face: 0, vertex: 2 }
        ));
    }

    #[test]
    fn test_rejects_repeated_index() {
        let vertices = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let err = TriMesh::new(vertices, vec![[0, 1, 1]]).unwrap_err();
        assert!(matches!(err, OvoidError::DegenerateFace { face: 0 }));
    }

    #[test]
    fn test_cube_area_and_volume() {
        let cube = unit_cube();
        assert_relative_eq!(cube.surface_area(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(cube.signed_volume(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(cube.bounding_box_diagonal(), 3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_volume_is_translation_invariant() {
        let cube = unit_cube();
        let shifted: Vec<Point3<f64>> = cube
            .positions()
            .iter()
            .map(|p| p + Vector3::new(10.0, -4.0, 2.5))
            .collect();
        let shifted = cube.with_positions(shifted).unwrap();
        assert_relative_eq!(shifted.signed_volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_with_positions_shares_faces() {
        let cube = unit_cube();
        let copy = cube.with_positions(cube.positions().to_vec()).unwrap();
        assert!(copy.shares_topology(&cube));

        let err = cube.with_positions(vec![Point3::origin()]).unwrap_err();
        assert!(matches!(err, OvoidError::InvalidState(_)));
    }

    #[test]
    fn test_face_normal_follows_winding() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        assert_relative_eq!(mesh.face_normal(0), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(
            mesh.face_barycenter(0),
            Point3::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_empty_faces_allowed() {
        let mesh = TriMesh::new(vec![Point3::origin()], Vec::new()).unwrap();
        assert_eq!(mesh.num_faces(), 0);
        assert_eq!(mesh.surface_area(), 0.0);
        assert_eq!(mesh.vertex_centroid(), Some(Point3::origin()));
    }
}
