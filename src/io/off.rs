//! Object File Format (OFF) support.
//!
//! ASCII only:
//!
//! ```text
//! OFF
//! <vertices> <faces> <edges>
//! x y z            (one line per vertex)
//! n i0 i1 ... in-1 (one line per face, optional trailing colour ignored)
//! ```
//!
//! Comments start with `#`. Polygons with more than three corners are fan
//! triangulated. Coordinates are written with Rust's shortest round-trip
//! formatting, so a save followed by a load reproduces positions exactly.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use super::{capacity_hint, format_error};
use crate::error::Result;
use crate::mesh::TriMesh;

/// Load a mesh from an OFF file.
///
/// # Example
///
/// ```no_run
/// use ovoid::io::off;
///
/// let mesh = off::load("bunny.off").unwrap();
/// println!("{} faces", mesh.num_faces());
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read(BufReader::new(file)).map_err(|e| super::attach_path(e, path))
}

/// Parse OFF data from a reader.
///
/// Format errors are reported as [`LoadError`](crate::error::OvoidError::LoadError)
/// with an empty path.
pub fn read<R: BufRead>(reader: R) -> Result<TriMesh> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("");
        let tokens: Vec<String> = content.split_whitespace().map(str::to_owned).collect();
        if !tokens.is_empty() {
            lines.push(tokens);
        }
    }
    let mut lines = lines.into_iter();

    let mut header = lines.next().ok_or_else(|| format_error("empty file"))?;
    if header[0] != "OFF" {
        return Err(format_error(format!("expected OFF header, found '{}'", header[0])));
    }
    // Counts may share the header line.
    header.remove(0);
    let counts = if header.is_empty() {
        lines.next().ok_or_else(|| format_error("missing element counts"))?
    } else {
        header
    };
    let mut counts = counts.iter();
    let num_vertices: usize = parse_token(counts.next(), "vertex count")?;
    let num_faces: usize = parse_token(counts.next(), "face count")?;

    let mut vertices = Vec::with_capacity(capacity_hint(num_vertices));
    for _ in 0..num_vertices {
        let line = lines.next().unwrap_or_default();
        let x: f64 = parse_token(line.first(), "x coordinate")?;
        let y: f64 = parse_token(line.get(1), "y coordinate")?;
        let z: f64 = parse_token(line.get(2), "z coordinate")?;
        vertices.push(Point3::new(x, y, z));
    }

    let mut faces = Vec::with_capacity(capacity_hint(num_faces));
    for f in 0..num_faces {
        let line = lines.next().unwrap_or_default();
        let corners: usize = parse_token(line.first(), "face corner count")?;
        if corners < 3 {
            return Err(format_error(format!("face {} has {} corners", f, corners)));
        }
        // Anything after the indices is a colour and ignored.
        let polygon = (1..=corners)
            .map(|i| parse_token::<usize>(line.get(i), "face index"))
            .collect::<Result<Vec<_>>>()?;
        for i in 1..corners - 1 {
            faces.push([polygon[0], polygon[i], polygon[i + 1]]);
        }
    }

    TriMesh::new(vertices, faces)
}

/// Save a mesh to an OFF file.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a mesh as OFF.
pub fn write<W: Write>(mesh: &TriMesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "OFF")?;
    writeln!(writer, "{} {} 0", mesh.num_vertices(), mesh.num_faces())?;
    for p in mesh.positions() {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    for [a, b, c] in mesh.faces() {
        writeln!(writer, "3 {} {} {}", a, b, c)?;
    }
    Ok(())
}

fn parse_token<T: std::str::FromStr>(token: Option<&String>, what: &str) -> Result<T> {
    let token =
        token.ok_or_else(|| format_error(format!("unexpected end of file reading {}", what)))?;
    token
        .parse()
        .map_err(|_| format_error(format!("invalid {} '{}'", what, token)))
}
