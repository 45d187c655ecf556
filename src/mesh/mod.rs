//! Core mesh data structures.
//!
//! This module provides the indexed triangle mesh shared by every stage of the
//! flow pipeline, plus the edge topology needed by the smoothers.
//!
//! # Overview
//!
//! The primary type is [`TriMesh`], an immutable face-vertex list. Stages never
//! edit a mesh in place: each returns a new [`TriMesh`], usually built with
//! [`TriMesh::with_positions`] so the face list is shared rather than copied.
//!
//! [`EdgeTopology`] derives undirected edges, their incident faces and vertex
//! one-rings from the face list.
//!
//! # Construction
//!
//! ```
//! use ovoid::mesh::TriMesh;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh = TriMesh::new(vertices, faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 3);
//! ```

pub mod primitives;
mod topology;
mod trimesh;

pub use topology::{edge_key, EdgeTopology};
pub use trimesh::TriMesh;
