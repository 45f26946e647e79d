//! External binaries used by tool-backed operations.
//!
//! # Design
//! - Binaries are resolved on `PATH` with `which` right before use.
//! - Output is captured; callers interpret exit status and streams.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{OpsError, OpsResult};

/// A named external binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalTool {
    name: &'static str,
}

impl ExternalTool {
    /// Video transcoder and decoder.
    pub const FFMPEG: Self = Self::new("ffmpeg");
    /// Media stream inspector.
    pub const FFPROBE: Self = Self::new("ffprobe");
    /// OCR engine.
    pub const TESSERACT: Self = Self::new("tesseract");
    /// Playlist downloader.
    pub const YT_DLP: Self = Self::new("yt-dlp");
    /// Media library renamer.
    pub const MNAMER: Self = Self::new("mnamer");
    /// Version control client.
    pub const GIT: Self = Self::new("git");

    /// Tool with an arbitrary binary name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Binary name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Absolute path of the binary, if installed.
    #[must_use]
    pub fn locate(self) -> Option<PathBuf> {
        which::which(self.name).ok()
    }

    /// Resolved handle, if installed.
    #[must_use]
    pub fn resolve(self) -> Option<ResolvedTool> {
        self.locate().map(|path| ResolvedTool { tool: self, path })
    }

    /// Resolve the binary or fail with [`OpsError::ToolMissing`].
    ///
    /// # Errors
    ///
    /// Returns an error if the binary is not on `PATH`.
    pub fn require(self) -> OpsResult<ResolvedTool> {
        self.resolve()
            .ok_or(OpsError::ToolMissing { tool: self.name })
    }

    /// User-facing message for a missing binary.
    #[must_use]
    pub fn missing_message(self) -> String {
        format!("{} is not installed or not on PATH", self.name)
    }
}

/// A tool whose binary was found.
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    tool: ExternalTool,
    path: PathBuf,
}

impl ResolvedTool {
    /// Run the binary with `args`, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn output<I, S>(&self, args: I) -> OpsResult<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        debug!(tool = self.tool.name, path = %self.path.display(), "running external tool");
        Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| OpsError::ToolSpawn {
                tool: self.tool.name,
                source,
            })
    }
}
