//! STL (stereolithography) format support.
//!
//! Loads binary and ASCII STL through `stl_io`, which already merges
//! bit-identical corners into shared vertices. Saves binary STL. STL stores
//! single precision, so a save/load round trip is exact only to `f32`.

use std::fs::File;
use std::io::{BufWriter, Read, Seek};
use std::path::Path;

use nalgebra::Point3;

use crate::error::{OvoidError, Result};
use crate::mesh::TriMesh;

/// Load a mesh from an STL file.
///
/// Triangles that reference the same vertex twice are skipped.
///
/// # Example
///
/// ```no_run
/// use ovoid::io::stl;
///
/// let mesh = stl::load("model.stl").unwrap();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    read(&mut file).map_err(|e| super::attach_path(e, path))
}

/// Parse STL data from a seekable reader.
pub fn read<R: Read + Seek>(reader: &mut R) -> Result<TriMesh> {
    let stl = stl_io::read_stl(reader).map_err(|e| super::format_error(e.to_string()))?;

    let vertices: Vec<Point3<f64>> = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();

    let faces: Vec<[usize; 3]> = stl
        .faces
        .iter()
        .map(|tri| tri.vertices)
        .filter(|&[a, b, c]| a != b && b != c && a != c)
        .collect();

    let skipped = stl.faces.len() - faces.len();
    if skipped > 0 {
        log::warn!("stl: skipped {} degenerate triangles", skipped);
    }
    if faces.is_empty() {
        return Err(super::format_error("STL file contains no valid triangles"));
    }

    TriMesh::new(vertices, faces)
}

/// Save a mesh to a binary STL file.
///
/// # Example
///
/// ```no_run
/// use ovoid::io::stl;
/// use ovoid::mesh::primitives::icosphere;
///
/// stl::save(&icosphere(2, 1.0), "sphere.stl").unwrap();
/// ```
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let to_vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);

    let triangles: Vec<stl_io::Triangle> = (0..mesh.num_faces())
        .map(|f| {
            let n = mesh.face_normal(f);
            let [p0, p1, p2] = mesh.face_positions(f);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [to_vertex(&p0), to_vertex(&p1), to_vertex(&p2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| OvoidError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(())
}
