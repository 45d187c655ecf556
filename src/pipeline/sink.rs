//! Per-iteration artifact writers.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::io::{off, vtk};
use crate::pipeline::IterationRecord;

/// Receives every completed iteration before the controller decides whether
/// to stop.
pub trait ArtifactSink {
    /// Persist or keep one iteration.
    fn record(&mut self, record: &IterationRecord) -> Result<()>;

    /// Flush anything buffered. Called once when the run ends, however it ends.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes iteration meshes and the semi-axis log into a directory.
///
/// For iteration `i` (zero padded to four digits):
///
/// | File | Content |
/// |------|---------|
/// | `temp_{i}.off` | flowed mesh |
/// | `temp_{i}.vtk` | smoothed mesh |
/// | `cleaned_{i}.vtk` | cleaned mesh |
/// | `ell_{i}.vtk` | fitted ellipsoid |
///
/// and one line `a, b, c` per iteration in `radii.txt`.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    radii: BufWriter<File>,
}

impl FileSink {
    /// Name of the semi-axis log inside the output directory.
    pub const RADII_FILE: &'static str = "radii.txt";

    /// Create the output directory if needed and truncate the semi-axis log.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let radii = BufWriter::new(File::create(dir.join(Self::RADII_FILE))?);
        Ok(Self { dir, radii })
    }

    /// The output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact(&self, stem: &str, index: usize, extension: &str) -> PathBuf {
        self.dir.join(format!("{}_{:04}.{}", stem, index, extension))
    }
}

impl ArtifactSink for FileSink {
    fn record(&mut self, record: &IterationRecord) -> Result<()> {
        // The log line goes out first so a failing mesh write cannot lose it.
        let r = &record.fit.radii;
        writeln!(self.radii, "{:.6}, {:.6}, {:.6}", r[0], r[1], r[2])?;
        self.radii.flush()?;

        let i = record.index;
        off::save(&record.flowed, self.artifact("temp", i, "off"))?;
        vtk::save(&record.smoothed, self.artifact("temp", i, "vtk"))?;
        vtk::save(&record.cleaned, self.artifact("cleaned", i, "vtk"))?;
        vtk::save(&record.ellipsoid, self.artifact("ell", i, "vtk"))?;

        log::debug!("sink: wrote iteration {} to {}", i, self.dir.display());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.radii.flush()?;
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.radii.flush() {
            log::warn!("sink: failed to flush {}: {}", Self::RADII_FILE, e);
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<IterationRecord>,
    finished: bool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far, in iteration order.
    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    /// Whether [`ArtifactSink::finish`] has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the sink, returning its records.
    pub fn into_records(self) -> Vec<IterationRecord> {
        self.records
    }
}

impl ArtifactSink for MemorySink {
    fn record(&mut self, record: &IterationRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn record(&mut self, record: &IterationRecord) -> Result<()> {
        (**self).record(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
