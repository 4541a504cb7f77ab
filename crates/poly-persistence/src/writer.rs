//! JSON Lines file writer for one collection session.

use crate::error::{PersistenceError, PersistenceResult};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zstd::stream::write::Encoder;

/// zstd compression level for output files.
const ZSTD_LEVEL: i32 = 3;

enum Output {
    Plain(BufWriter<File>),
    Compressed(BufWriter<Encoder<'static, File>>),
}

/// Writes JSON records, one per line, to a single output file.
///
/// Close order matters: the line buffer is flushed before the compression
/// frame is finished, and the frame is finished before the file handle is
/// dropped, so no buffered records are lost on shutdown.
pub struct EventWriter {
    path: PathBuf,
    out: Option<Output>,
    lines_written: u64,
}

impl EventWriter {
    /// Create the output file (and any missing parent directories).
    pub fn create(path: impl Into<PathBuf>, compress: bool) -> PersistenceResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        let out = if compress {
            Output::Compressed(BufWriter::new(Encoder::new(file, ZSTD_LEVEL)?))
        } else {
            Output::Plain(BufWriter::new(file))
        };

        debug!(path = %path.display(), compress, "Opened event writer");
        Ok(Self {
            path,
            out: Some(out),
            lines_written: 0,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Serialize one record and append it as a line.
    pub fn write_json<T: Serialize>(&mut self, record: &T) -> PersistenceResult<()> {
        let out = self.out.as_mut().ok_or(PersistenceError::Closed)?;
        let line = serde_json::to_string(record)?;
        match out {
            Output::Plain(w) => writeln!(w, "{line}")?,
            Output::Compressed(w) => writeln!(w, "{line}")?,
        }
        self.lines_written += 1;
        Ok(())
    }

    /// Flush buffered lines through to the file.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        match self.out.as_mut() {
            Some(Output::Plain(w)) => w.flush()?,
            Some(Output::Compressed(w)) => w.flush()?,
            None => {}
        }
        Ok(())
    }

    /// Flush, finish the compression frame, and release the file.
    /// Idempotent; the writer rejects further writes afterwards.
    pub fn close(&mut self) -> PersistenceResult<()> {
        let Some(out) = self.out.take() else {
            return Ok(());
        };

        match out {
            Output::Plain(mut w) => {
                w.flush()?;
            }
            Output::Compressed(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
            }
        }

        debug!(
            path = %self.path.display(),
            lines = self.lines_written,
            "Closed event writer"
        );
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(?e, path = %self.path.display(), "Failed to close writer on drop");
        }
    }
}
