//! Undirected edge topology of a triangle mesh.
//!
//! Built from the face list alone. Used by the smoothers to classify vertices
//! (boundary, non-manifold, feature) and to find one-ring neighbors.

use std::collections::HashMap;

use crate::mesh::TriMesh;

/// Canonical key for the undirected edge between `a` and `b`.
#[inline]
pub fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Edge-to-face incidence and vertex one-rings.
#[derive(Debug, Clone)]
pub struct EdgeTopology {
    edge_faces: HashMap<(usize, usize), Vec<usize>>,
    neighbors: Vec<Vec<usize>>,
}

impl EdgeTopology {
    /// Build the topology of `mesh`.
    pub fn new(mesh: &TriMesh) -> Self {
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> =
            HashMap::with_capacity(mesh.num_faces() * 3 / 2);
        let mut neighbors = vec![Vec::new(); mesh.num_vertices()];

        for (fi, &[a, b, c]) in mesh.faces().iter().enumerate() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                edge_faces.entry(edge_key(u, v)).or_default().push(fi);
                neighbors[u].push(v);
                neighbors[v].push(u);
            }
        }

        for ring in &mut neighbors {
            ring.sort_unstable();
            ring.dedup();
        }

        Self {
            edge_faces,
            neighbors,
        }
    }

    /// Sorted, deduplicated one-ring of vertex `v`.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.neighbors[v]
    }

    /// Faces incident to the edge `(a, b)`; empty if there is no such edge.
    pub fn edge_faces(&self, a: usize, b: usize) -> &[usize] {
        self.edge_faces
            .get(&edge_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edge_faces.len()
    }

    /// All edges with their incident faces.
    pub fn edges(&self) -> impl Iterator<Item = ((usize, usize), &[usize])> + '_ {
        self.edge_faces.iter().map(|(&k, f)| (k, f.as_slice()))
    }

    /// Edges with exactly one incident face.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(e, _)| e)
    }

    /// Edges with more than two incident faces.
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(e, _)| e)
    }

    /// Whether every edge has exactly two incident faces.
    pub fn is_closed_manifold(&self) -> bool {
        !self.edge_faces.is_empty() && self.edge_faces.values().all(|f| f.len() == 2)
    }

    /// Angle in radians between the normals of the two faces sharing `(a, b)`.
    ///
    /// Zero for coplanar faces, approaching π for a fold. `None` unless the
    /// edge is manifold (exactly two faces).
    pub fn dihedral_angle(&self, mesh: &TriMesh, a: usize, b: usize) -> Option<f64> {
        match self.edge_faces(a, b) {
            &[f0, f1] => {
                let n0 = mesh.face_normal(f0);
                let n1 = mesh.face_normal(f1);
                Some(n0.dot(&n1).clamp(-1.0, 1.0).acos())
            }
            _ => None,
        }
    }
}
