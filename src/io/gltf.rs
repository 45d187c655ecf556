//! glTF format support.
//!
//! Loads meshes from glTF and GLB files. Every triangle primitive of every
//! mesh in the document is merged into one [`TriMesh`]; node transforms are
//! not applied. Saving to glTF is not supported.

use std::path::Path;

use nalgebra::Point3;

use crate::error::Result;
use crate::mesh::TriMesh;

/// Load a mesh from a glTF or GLB file.
///
/// Primitives without an index buffer use their positions in order.
/// Point and line primitives are skipped.
///
/// # Example
///
/// ```no_run
/// use ovoid::io::gltf;
///
/// let mesh = gltf::load("model.glb").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();

    let (document, buffers, _images) = ::gltf::import(path)
        .map_err(|e| super::attach_path(super::format_error(e.to_string()), path))?;

    let mut all_vertices: Vec<Point3<f64>> = Vec::new();
    let mut all_faces: Vec<[usize; 3]> = Vec::new();

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let offset = all_vertices.len();
            all_vertices.extend(
                positions.map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)),
            );
            let count = all_vertices.len() - offset;

            let indices: Vec<usize> = match reader.read_indices() {
                Some(indices) => indices.into_u32().map(|i| i as usize + offset).collect(),
                None => (offset..offset + count).collect(),
            };

            match primitive.mode() {
                ::gltf::mesh::Mode::Triangles => {
                    all_faces.extend(
                        indices
                            .chunks_exact(3)
                            .map(|c| [c[0], c[1], c[2]]),
                    );
                }
                ::gltf::mesh::Mode::TriangleStrip => {
                    for i in 0..indices.len().saturating_sub(2) {
                        if i % 2 == 0 {
                            all_faces.push([indices[i], indices[i + 1], indices[i + 2]]);
                        } else {
                            all_faces.push([indices[i], indices[i + 2], indices[i + 1]]);
                        }
                    }
                }
                ::gltf::mesh::Mode::TriangleFan => {
                    for i in 1..indices.len().saturating_sub(1) {
                        all_faces.push([indices[0], indices[i], indices[i + 1]]);
                    }
                }
                mode => {
                    log::debug!("gltf: skipping {:?} primitive", mode);
                }
            }
        }
    }

    let before = all_faces.len();
    all_faces.retain(|&[a, b, c]| a != b && b != c && a != c);
    if all_faces.len() < before {
        log::warn!(
            "gltf: skipped {} degenerate triangles",
            before - all_faces.len()
        );
    }

    if all_faces.is_empty() {
        return Err(super::attach_path(
            super::format_error("glTF file contains no triangle meshes"),
            path,
        ));
    }

    TriMesh::new(all_vertices, all_faces).map_err(|e| super::attach_path(e, path))
}
