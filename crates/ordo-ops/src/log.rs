//! Line-oriented run log written by every operation.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{OpsError, OpsResult};
use crate::model::Manifest;

/// Append-only, timestamped text log for one operation run.
pub struct OperationLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OperationLog {
    /// Open (or create) the log at `path` in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> OpsResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| OpsError::io("log.open", path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Append one line prefixed with the local time.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn line(&mut self, message: impl AsRef<str>) -> OpsResult<()> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "{stamp} - {}", message.as_ref())
            .map_err(|source| OpsError::io("log.write", &self.path, source))
    }

    /// Flush buffered lines to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn finish(mut self) -> OpsResult<()> {
        self.writer
            .flush()
            .map_err(|source| OpsError::io("log.flush", &self.path, source))
    }

    /// Record `message`, close the log and report it as a soft failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn soft_failure(mut self, message: impl Into<String>) -> OpsResult<Manifest> {
        let message = message.into();
        self.line(&message)?;
        self.finish()?;
        Ok(Manifest::soft_error(message))
    }
}

/// Prefix for a mutating action under the given mode.
pub(crate) const fn action(dry_run: bool, live: &'static str, simulated: &'static str) -> &'static str {
    if dry_run { simulated } else { live }
}
