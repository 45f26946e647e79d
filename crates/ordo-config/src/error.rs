//! # Design
//!
//! - Constant error messages; the failing field, reason and raw value ride along.
//! - Directory preparation failures keep the offending path and IO source.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Environment variable or field name.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The working directory could not be resolved.
    #[error("failed to resolve working directory")]
    WorkingDirectory {
        /// Underlying IO error.
        source: io::Error,
    },
    /// A configured directory could not be created.
    #[error("failed to prepare configured directory")]
    Directory {
        /// Role of the directory (`log_dir`, `temp_dir`, ...).
        role: &'static str,
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}
