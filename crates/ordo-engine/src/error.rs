//! # Design
//!
//! - Constant messages; paths, identifiers and sources travel as fields.
//! - Only registry construction and artifact handling can fail here. Operation
//!   failures never escape the executor and are not represented.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for engine internals.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised inside the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Two descriptors were registered under the same id.
    #[error("duplicate operation id")]
    DuplicateOperation {
        /// The repeated identifier.
        id: String,
    },
    /// IO failures while touching log or artifact directories.
    #[error("engine io failure")]
    Io {
        /// Step that triggered the failure.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures while collecting artifact contents.
    #[error("engine walkdir failure")]
    Walkdir {
        /// Step that triggered the failure.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Archive creation failures.
    #[error("engine zip failure")]
    Zip {
        /// Step that triggered the failure.
        operation: &'static str,
        /// Archive path.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
}

impl EngineError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_stay_constant() {
        let err = EngineError::io("package.copy", "/tmp/a", io::Error::other("full"));
        assert_eq!(err.to_string(), "engine io failure");
        let dup = EngineError::DuplicateOperation {
            id: "rename_files".into(),
        };
        assert_eq!(dup.to_string(), "duplicate operation id");
    }
}
