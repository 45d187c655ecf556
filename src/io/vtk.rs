//! Legacy VTK polydata support.
//!
//! Writes ASCII `DATASET POLYDATA` files with `POINTS` and `POLYGONS`
//! sections. Reads the same, plus `TRIANGLE_STRIPS`, both the classic cell
//! layout (`count i0 i1 ...`) and the version 5 `OFFSETS`/`CONNECTIVITY`
//! layout. `VERTICES` and `LINES` are skipped and attribute data
//! (`POINT_DATA`, `CELL_DATA`, ...) ends parsing.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;

use super::{capacity_hint, format_error};
use crate::error::Result;
use crate::mesh::TriMesh;

/// Load a mesh from a legacy VTK polydata file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read(BufReader::new(file)).map_err(|e| super::attach_path(e, path))
}

/// Parse legacy VTK polydata from a reader.
pub fn read<R: BufRead>(reader: R) -> Result<TriMesh> {
    let mut lines = reader.lines();

    let version = lines.next().transpose()?.unwrap_or_default();
    if !version.trim_start().starts_with("# vtk DataFile") {
        return Err(format_error("missing '# vtk DataFile' header"));
    }
    let _title = lines.next().transpose()?;

    let mut tokens = Vec::new();
    for line in lines {
        tokens.extend(line?.split_whitespace().map(str::to_owned));
    }
    let mut tokens = Tokens::new(tokens);

    match tokens.next_str("file type")?.to_ascii_uppercase().as_str() {
        "ASCII" => {}
        "BINARY" => return Err(format_error("binary VTK files are not supported")),
        other => return Err(format_error(format!("unknown file type '{}'", other))),
    }
    if tokens.next_str("DATASET")?.to_ascii_uppercase() != "DATASET" {
        return Err(format_error("expected DATASET"));
    }
    let dataset = tokens.next_str("dataset type")?;
    if dataset.to_ascii_uppercase() != "POLYDATA" {
        return Err(format_error(format!(
            "unsupported dataset '{}', expected POLYDATA",
            dataset
        )));
    }

    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut faces: Vec<[usize; 3]> = Vec::new();

    while let Some(keyword) = tokens.peek() {
        match keyword.to_ascii_uppercase().as_str() {
            "POINTS" => {
                tokens.skip(1);
                let n: usize = tokens.parse("point count")?;
                let _data_type = tokens.next_str("point data type")?;
                vertices.reserve(capacity_hint(n));
                for _ in 0..n {
                    let x = tokens.parse("x coordinate")?;
                    let y = tokens.parse("y coordinate")?;
                    let z = tokens.parse("z coordinate")?;
                    vertices.push(Point3::new(x, y, z));
                }
            }
            "POLYGONS" => {
                tokens.skip(1);
                for polygon in read_cells(&mut tokens)? {
                    fan(&polygon, &mut faces);
                }
            }
            "TRIANGLE_STRIPS" => {
                tokens.skip(1);
                for strip in read_cells(&mut tokens)? {
                    for i in 0..strip.len().saturating_sub(2) {
                        if i % 2 == 0 {
                            faces.push([strip[i], strip[i + 1], strip[i + 2]]);
                        } else {
                            faces.push([strip[i + 1], strip[i], strip[i + 2]]);
                        }
                    }
                }
            }
            "VERTICES" | "LINES" => {
                tokens.skip(1);
                read_cells(&mut tokens)?;
            }
            "METADATA" => {
                // Version 5 metadata block: skip until the next section keyword.
                tokens.skip(1);
                while let Some(t) = tokens.peek() {
                    if is_section_keyword(t) {
                        break;
                    }
                    tokens.skip(1);
                }
            }
            _ => break,
        }
    }

    TriMesh::new(vertices, faces)
}

fn is_section_keyword(token: &str) -> bool {
    matches!(
        token.to_ascii_uppercase().as_str(),
        "POINTS"
            | "POLYGONS"
            | "TRIANGLE_STRIPS"
            | "VERTICES"
            | "LINES"
            | "POINT_DATA"
            | "CELL_DATA"
            | "FIELD"
    )
}

/// Read a cell section after its keyword, in either layout.
fn read_cells(tokens: &mut Tokens) -> Result<Vec<Vec<usize>>> {
    let n: usize = tokens.parse("cell count")?;
    let size: usize = tokens.parse("cell list size")?;

    if tokens
        .peek()
        .is_some_and(|t| t.eq_ignore_ascii_case("OFFSETS"))
    {
        tokens.skip(2);
        let offsets = (0..n)
            .map(|_| tokens.parse::<usize>("cell offset"))
            .collect::<Result<Vec<_>>>()?;
        if !tokens
            .next_str("CONNECTIVITY")?
            .eq_ignore_ascii_case("CONNECTIVITY")
        {
            return Err(format_error("expected CONNECTIVITY after OFFSETS"));
        }
        tokens.skip(1);
        let connectivity = (0..size)
            .map(|_| tokens.parse::<usize>("cell index"))
            .collect::<Result<Vec<_>>>()?;

        let mut cells = Vec::with_capacity(capacity_hint(n.saturating_sub(1)));
        for w in offsets.windows(2) {
            let (start, end) = (w[0], w[1]);
            if start > end || end > connectivity.len() {
                return Err(format_error("cell offsets out of range"));
            }
            cells.push(connectivity[start..end].to_vec());
        }
        return Ok(cells);
    }

    let mut cells = Vec::with_capacity(capacity_hint(n));
    let mut consumed = 0;
    for _ in 0..n {
        let count: usize = tokens.parse("cell size")?;
        let cell = (0..count)
            .map(|_| tokens.parse::<usize>("cell index"))
            .collect::<Result<Vec<_>>>()?;
        consumed += count + 1;
        cells.push(cell);
    }
    if consumed != size {
        return Err(format_error(format!(
            "cell list size {} does not match contents ({})",
            size, consumed
        )));
    }
    Ok(cells)
}

fn fan(polygon: &[usize], faces: &mut Vec<[usize; 3]>) {
    for i in 1..polygon.len().saturating_sub(1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Save a mesh as ASCII legacy VTK polydata.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a mesh as ASCII legacy VTK polydata.
pub fn write<W: Write>(mesh: &TriMesh, writer: &mut W) -> Result<()> {
    writeln!(writer, "# vtk DataFile Version 4.2")?;
    writeln!(writer, "ovoid output")?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET POLYDATA")?;
    writeln!(writer, "POINTS {} double", mesh.num_vertices())?;
    for p in mesh.positions() {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    if mesh.num_faces() > 0 {
        writeln!(writer, "POLYGONS {} {}", mesh.num_faces(), 4 * mesh.num_faces())?;
        for [a, b, c] in mesh.faces() {
            writeln!(writer, "3 {} {} {}", a, b, c)?;
        }
    }
    Ok(())
}

struct Tokens {
    tokens: Vec<String>,
    cursor: usize,
}

impl Tokens {
    fn new(tokens: Vec<String>) -> Self {
        Self { tokens, cursor: 0 }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.cursor).map(String::as_str)
    }

    fn skip(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.tokens.len());
    }

    fn next_str(&mut self, what: &str) -> Result<String> {
        let token = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| format_error(format!("unexpected end of file reading {}", what)))?;
        self.cursor += 1;
        Ok(token)
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.next_str(what)?;
        token
            .parse()
            .map_err(|_| format_error(format!("invalid {} '{}'", what, token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OvoidError;
    use crate::mesh::primitives::icosphere;

    #[test]
    fn test_round_trip() {
        let sphere = icosphere(1, 0.7);
        let mut buffer = Vec::new();
        write(&sphere, &mut buffer).unwrap();

        let loaded = read(buffer.as_slice()).unwrap();
        assert_eq!(loaded.positions(), sphere.positions());
        assert_eq!(loaded.faces(), sphere.faces());
    }

    #[test]
    fn test_save_and_load_file() {
        let sphere = icosphere(0, 1.0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ico.vtk");
        save(&sphere, &path).unwrap();
        assert_eq!(load(&path).unwrap(), sphere);
    }

    #[test]
    fn test_reads_strips_and_skips_lines() {
        let data = "\
# vtk DataFile Version 3.0
strip test
ASCII
DATASET POLYDATA
POINTS 5 float
0 0 0 1 0 0 0 1 0
1 1 0 2 1 0
LINES 1 3
2 0 4
TRIANGLE_STRIPS 1 5
4 0 1 2 3
POINT_DATA 5
SCALARS s float 1
";
        let mesh = read(data.as_bytes()).unwrap();
        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.faces(), &[[0, 1, 2], [2, 1, 3]]);
    }

    #[test]
    fn test_reads_offsets_layout() {
        let data = "\
# vtk DataFile Version 5.1
vtk output
ASCII
DATASET POLYDATA
POINTS 4 float
0 0 0 1 0 0 1 1 0
0 1 0
POLYGONS 3 6
OFFSETS vtktypeint64
0 3 6
CONNECTIVITY vtktypeint64
0 1 2 0 2 3
";
        let mesh = read(data.as_bytes()).unwrap();
        assert_eq!(mesh.faces(), &[[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_oversized_header_counts_fail_cleanly() {
        let points = "# vtk DataFile Version 3.0\nx\nASCII\nDATASET POLYDATA\n\
POINTS 100000000000000 float\n0 0 0\n";
        assert!(matches!(
            read(points.as_bytes()),
            Err(OvoidError::LoadError { .. })
        ));

        let cells = "# vtk DataFile Version 3.0\nx\nASCII\nDATASET POLYDATA\n\
POINTS 3 float\n0 0 0 1 0 0 0 1 0\nPOLYGONS 100000000000000 4\n3 0 1 2\n";
        assert!(matches!(
            read(cells.as_bytes()),
            Err(OvoidError::LoadError { .. })
        ));
    }

    #[test]
    fn test_rejects_other_datasets() {
        let data = "# vtk DataFile Version 3.0\nx\nASCII\nDATASET STRUCTURED_POINTS\n";
        assert!(matches!(
            read(data.as_bytes()),
            Err(OvoidError::LoadError { .. })
        ));
        assert!(matches!(
            read("hello\n".as_bytes()),
            Err(OvoidError::LoadError { .. })
        ));
    }
}
