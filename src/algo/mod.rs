//! Geometry algorithms of the flow pipeline.
//!
//! One module per stage, each operating on immutable [`TriMesh`] values:
//!
//! - [`operators`]: cotangent Laplacian and barycentric mass matrix
//! - [`flow`]: implicit Euler mean curvature flow step
//! - [`normalize`]: area-weighted recentring and unit-area rescaling
//! - [`smooth`]: windowed-sinc and Laplacian smoothing
//! - [`clean`]: near-duplicate vertex merging
//! - [`ellipsoid`]: principal-axis ellipsoid fitting and tessellation
//! - [`distance`]: point-to-surface distance fields
//! - [`deviation`]: quantile deviation statistic
//!
//! [`TriMesh`]: crate::mesh::TriMesh

pub mod clean;
pub mod deviation;
pub mod distance;
pub mod ellipsoid;
pub mod flow;
pub mod normalize;
pub mod operators;
pub mod smooth;
