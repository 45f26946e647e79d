//! # Design
//!
//! - Constant messages with operation, path and tool context attached as fields.
//! - Missing external tools get a dedicated variant so callers can choose soft or hard failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for operation implementations.
pub type OpsResult<T> = Result<T, OpsError>;

/// Errors raised by operation implementations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// IO failures while touching the filesystem.
    #[error("operation io failure")]
    Io {
        /// Step that triggered the failure.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("operation walkdir failure")]
    Walkdir {
        /// Step that triggered the failure.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// The target or a parameter was not acceptable.
    #[error("operation invalid input")]
    InvalidInput {
        /// Input that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A required external binary is not on `PATH`.
    #[error("required external tool not found")]
    ToolMissing {
        /// Binary name.
        tool: &'static str,
    },
    /// An external binary could not be started.
    #[error("external tool failed to start")]
    ToolSpawn {
        /// Binary name.
        tool: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A built-in pattern failed to compile.
    #[error("operation pattern invalid")]
    Pattern {
        /// Pattern source text.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// HTTP client construction failed.
    #[error("http client failure")]
    HttpClient {
        /// Underlying client error.
        source: reqwest::Error,
    },
}

impl OpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pattern(pattern: &'static str) -> OpsResult<regex::Regex> {
        regex::Regex::new(pattern).map_err(|source| Self::Pattern { pattern, source })
    }

    /// One-line description including the most useful context field.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::Walkdir { path, source, .. } => {
                format!("could not traverse {}: {source}", path.display())
            }
            Self::InvalidInput {
                field,
                reason,
                value,
            } => match value {
                Some(value) => format!("invalid {field} ({reason}): {value}"),
                None => format!("invalid {field} ({reason})"),
            },
            Self::ToolMissing { tool } => format!("'{tool}' was not found on PATH"),
            Self::ToolSpawn { tool, source } => format!("could not start '{tool}': {source}"),
            Self::Pattern { pattern, source } => format!("pattern {pattern} is invalid: {source}"),
            Self::HttpClient { source } => format!("http client error: {source}"),
        }
    }
}
