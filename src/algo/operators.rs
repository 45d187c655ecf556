//! Discrete Laplace-Beltrami and mass operators.
//!
//! The cotangent Laplacian follows the libigl sign convention:
//!
//! ```text
//! L[i,j] = ½ (cot α_ij + cot β_ij)     for each edge (i, j)
//! L[i,i] = -Σ_j L[i,j]
//! ```
//!
//! where α_ij and β_ij are the angles opposite the edge in its two triangles.
//! L is symmetric negative semidefinite, so `M - dt·L` is positive definite for
//! any positive mass matrix M and time step dt.
//!
//! The Laplacian depends on connectivity and the geometry it was built from; the
//! flow builds it once from the input mesh. The barycentric mass matrix depends
//! on current positions and is rebuilt every step.
//!
//! # References
//!
//! - Meyer, M., et al. (2003). "Discrete Differential-Geometry Operators for
//!   Triangulated 2-Manifolds." Visualization and Mathematics III.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::error::{OvoidError, Result};
use crate::mesh::TriMesh;

/// Faces whose squared double area falls below this fraction of their longest
/// squared edge length are treated as zero-area.
const ZERO_AREA_RATIO: f64 = 1e-12;

/// Sparse cotangent Laplacian.
#[derive(Debug, Clone)]
pub struct CotanLaplacian {
    matrix: CscMatrix<f64>,
}

impl CotanLaplacian {
    /// Build the cotangent Laplacian of `mesh`.
    ///
    /// # Errors
    ///
    /// - [`OvoidError::EmptyMesh`] if the mesh has no faces.
    /// - [`OvoidError::ZeroAreaFace`] if a face has (numerically) zero area,
    ///   since its cotangents are undefined.
    pub fn new(mesh: &TriMesh) -> Result<Self> {
        if mesh.num_faces() == 0 {
            return Err(OvoidError::EmptyMesh);
        }

        let n = mesh.num_vertices();
        let mut coo = CooMatrix::new(n, n);

        for (f, &[v0, v1, v2]) in mesh.faces().iter().enumerate() {
            let [p0, p1, p2] = mesh.face_positions(f);

            let e01 = p1 - p0;
            let e12 = p2 - p1;
            let e20 = p0 - p2;

            let double_area = e01.cross(&(-e20)).norm();
            let longest = e01
                .norm_squared()
                .max(e12.norm_squared())
                .max(e20.norm_squared());
            if !(double_area.is_finite() && double_area * double_area > ZERO_AREA_RATIO * longest * longest) {
                return Err(OvoidError::ZeroAreaFace { face: f });
            }

            // cot of the corner angle = dot / |cross|; |cross| is the double area.
            let cot0 = e01.dot(&(-e20)) / double_area;
            let cot1 = e12.dot(&(-e01)) / double_area;
            let cot2 = e20.dot(&(-e12)) / double_area;

            push_edge(&mut coo, v1, v2, 0.5 * cot0);
            push_edge(&mut coo, v2, v0, 0.5 * cot1);
            push_edge(&mut coo, v0, v1, 0.5 * cot2);
        }

        Ok(Self {
            matrix: CscMatrix::from(&coo),
        })
    }

    /// The underlying sparse matrix.
    #[inline]
    pub fn matrix(&self) -> &CscMatrix<f64> {
        &self.matrix
    }

    /// Number of rows (and columns).
    #[inline]
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Compute `L * x`.
    pub fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.dim(), "Vector dimension mismatch");

        let mut y = DVector::zeros(self.dim());
        for (row, col, value) in self.matrix.triplet_iter() {
            y[row] += value * x[col];
        }
        y
    }
}

/// Add the symmetric contribution of weight `w` on edge (i, j).
fn push_edge(coo: &mut CooMatrix<f64>, i: usize, j: usize, w: f64) {
    coo.push(i, j, w);
    coo.push(j, i, w);
    coo.push(i, i, -w);
    coo.push(j, j, -w);
}

/// Barycentric lumped mass matrix, stored as its diagonal.
#[derive(Debug, Clone)]
pub struct MassMatrix {
    diagonal: DVector<f64>,
}

impl MassMatrix {
    /// Build the barycentric mass matrix: each vertex receives one third of the
    /// area of every incident triangle.
    ///
    /// # Errors
    ///
    /// - [`OvoidError::EmptyMesh`] if the mesh has no faces.
    /// - [`OvoidError::DegenerateMass`] for the first entry that is not
    ///   strictly positive and finite (zero-area triangles, or a vertex no
    ///   triangle references).
    pub fn barycentric(mesh: &TriMesh) -> Result<Self> {
        if mesh.num_faces() == 0 {
            return Err(OvoidError::EmptyMesh);
        }

        let mut diagonal: DVector<f64> = DVector::zeros(mesh.num_vertices());
        for (f, &[v0, v1, v2]) in mesh.faces().iter().enumerate() {
            let third = mesh.face_area(f) / 3.0;
            diagonal[v0] += third;
            diagonal[v1] += third;
            diagonal[v2] += third;
        }

        if let Some((vertex, &value)) = diagonal
            .iter()
            .enumerate()
            .find(|&(_, &m)| !(m.is_finite() && m > 0.0))
        {
            return Err(OvoidError::DegenerateMass { vertex, value });
        }

        Ok(Self { diagonal })
    }

    /// Diagonal entries.
    #[inline]
    pub fn diagonal(&self) -> &DVector<f64> {
        &self.diagonal
    }

    /// Number of vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.diagonal.len()
    }

    /// Whether the matrix is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.diagonal.is_empty()
    }

    /// Sum of all entries (equals the surface area).
    pub fn total(&self) -> f64 {
        self.diagonal.sum()
    }
}
