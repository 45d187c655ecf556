//! Mesh file I/O.
//!
//! This module provides functions for loading and saving meshes in various formats.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | OFF | `.off` | ✓ | ✓ | ASCII, exact round trip |
//! | Legacy VTK | `.vtk` | ✓ | ✓ | ASCII polydata |
//! | PLY | `.ply` | ✓ | ✓ | Stanford polygon format |
//! | STL | `.stl` | ✓ | ✓ | Binary and ASCII, single precision |
//! | glTF | `.gltf`, `.glb` | ✓ | ✗ | Modern 3D format |
//!
//! # Usage
//!
//! ```no_run
//! use ovoid::io::{load, save};
//!
//! let mesh = load("bunny.off").unwrap();
//! save(&mesh, "bunny.vtk").unwrap();
//! ```
//!
//! Format-specific modules expose `read`/`write` over arbitrary streams as well:
//!
//! ```
//! use ovoid::io::off;
//! use ovoid::mesh::primitives::icosahedron;
//!
//! let mut buffer = Vec::new();
//! off::write(&icosahedron(1.0), &mut buffer).unwrap();
//! let back = off::read(buffer.as_slice()).unwrap();
//! assert_eq!(back.num_faces(), 20);
//! ```

pub mod gltf;
pub mod off;
pub mod ply;
pub mod stl;
pub mod vtk;

use std::path::{Path, PathBuf};

use crate::error::{OvoidError, Result};
use crate::mesh::TriMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Object File Format.
    Off,
    /// Legacy VTK polydata.
    Vtk,
    /// PLY (Stanford polygon) format.
    Ply,
    /// STL (stereolithography) format.
    Stl,
    /// glTF format.
    Gltf,
    /// glTF binary format.
    Glb,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "off" => Some(Format::Off),
            "vtk" => Some(Format::Vtk),
            "ply" => Some(Format::Ply),
            "stl" => Some(Format::Stl),
            "gltf" => Some(Format::Gltf),
            "glb" => Some(Format::Glb),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }

    fn require(path: &Path) -> Result<Format> {
        Format::from_path(path).ok_or_else(|| OvoidError::UnsupportedFormat {
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("(none)")
                .to_string(),
        })
    }
}

/// Load a mesh from a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let mesh = match Format::require(path)? {
        Format::Off => off::load(path),
        Format::Vtk => vtk::load(path),
        Format::Ply => ply::load(path),
        Format::Stl => stl::load(path),
        Format::Gltf | Format::Glb => gltf::load(path),
    }?;
    log::debug!(
        "loaded {}: {} vertices, {} faces",
        path.display(),
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(mesh)
}

/// Save a mesh to a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match Format::require(path)? {
        Format::Off => off::save(mesh, path),
        Format::Vtk => vtk::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
        Format::Stl => stl::save(mesh, path),
        Format::Gltf | Format::Glb => Err(OvoidError::SaveError {
            path: path.to_path_buf(),
            message: "glTF saving is not supported".to_string(),
        }),
    }
}

/// Largest element count a parser pre-allocates from a header.
const MAX_PREALLOC: usize = 1 << 20;

/// Capacity to reserve for `count` elements announced by a file header.
///
/// Headers are untrusted; larger counts grow the buffer as data arrives.
pub(crate) fn capacity_hint(count: usize) -> usize {
    count.min(MAX_PREALLOC)
}

/// A [`OvoidError::LoadError`] without a path, for stream parsers.
pub(crate) fn format_error(message: impl Into<String>) -> OvoidError {
    OvoidError::LoadError {
        path: PathBuf::new(),
        message: message.into(),
    }
}

/// Fill in the file path of a load error raised by a stream parser.
pub(crate) fn attach_path(error: OvoidError, path: &Path) -> OvoidError {
    match error {
        OvoidError::LoadError { message, .. } => OvoidError::LoadError {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    }
}
