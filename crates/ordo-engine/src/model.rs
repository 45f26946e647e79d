//! Request, validation and result types exchanged with the presentation layer.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use ordo_ops::OperationParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One batch of operations requested against a single target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutionRequest {
    /// Filesystem path or output root, if supplied.
    #[serde(default)]
    pub target: Option<String>,
    /// Operation ids in presentation order.
    #[serde(default, rename = "operations")]
    pub operation_ids: Vec<String>,
    /// Simulate without mutating the filesystem.
    #[serde(default)]
    pub dry_run: bool,
    /// Operation-specific auxiliary fields.
    #[serde(default)]
    pub params: OperationParams,
}

impl ExecutionRequest {
    /// Request against `target` with the given operations.
    #[must_use]
    pub fn new<I, S>(target: Option<&str>, operation_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.map(str::to_string),
            operation_ids: operation_ids.into_iter().map(Into::into).collect(),
            dry_run: false,
            params: OperationParams::new(),
        }
    }

    /// Builder-style dry-run toggle.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builder-style parameter insert.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params = self.params.with(name, value);
        self
    }

    /// Trimmed target, treating blank input as absent.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }
}

/// Target resolved by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTarget {
    /// Path every operation in the batch receives.
    pub path: PathBuf,
    /// Informational notice, e.g. default directory substitution.
    pub notice: Option<String>,
}

/// Reasons a request is refused before any operation runs.
#[derive(Debug, Error)]
pub enum Rejection {
    /// The request named no operations.
    #[error("no operation selected")]
    NoOperationSelected,
    /// A path is needed but none was given.
    #[error("please enter a valid path")]
    PathRequired,
    /// The path does not exist and may not be created.
    #[error("target path does not exist")]
    TargetMissing {
        /// Requested path.
        path: PathBuf,
    },
    /// An output root could not be created.
    #[error("target directory could not be created")]
    CreateFailed {
        /// Requested path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl Rejection {
    /// User-facing text including the creation error when there is one.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::CreateFailed { path, source } => {
                format!("{self}: {}: {source}", path.display())
            }
            Self::TargetMissing { path } => format!("{self}: {}", path.display()),
            Self::NoOperationSelected | Self::PathRequired => self.to_string(),
        }
    }
}

/// Final state of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The manifest came back without an error.
    Success,
    /// Soft failure, hard failure or local validation failure.
    Failure,
}

/// Presentation severity of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Completed as requested.
    Success,
    /// Informational notice.
    Info,
    /// Completed with a caveat, or failed softly.
    Warning,
    /// Failed.
    Danger,
}

/// Outcome of one requested operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Requested identifier.
    pub operation_id: String,
    /// Success or failure.
    pub status: ExecutionStatus,
    /// Presentation severity.
    pub severity: Severity,
    /// One-line outcome.
    pub user_message: String,
    /// Basename of the run log, when one was reserved.
    pub log_file_name: Option<String>,
    /// Basename of the packaged artifact.
    pub download_link: Option<String>,
    /// Items acted on, when reported.
    pub acted_on: Option<u64>,
    /// Items skipped or failed, when reported.
    pub skipped: Option<u64>,
}

impl ExecutionResult {
    pub(crate) fn failure(
        operation_id: &str,
        severity: Severity,
        user_message: String,
        log_file_name: Option<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            status: ExecutionStatus::Failure,
            severity,
            user_message,
            log_file_name,
            download_link: None,
            acted_on: None,
            skipped: None,
        }
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Severity-tagged line for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    /// Presentation severity.
    pub severity: Severity,
    /// Message text.
    pub text: String,
}

/// Everything produced for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Target the batch ran against.
    pub target: PathBuf,
    /// Informational notices raised during validation.
    pub notices: Vec<String>,
    /// One entry per distinct requested operation.
    pub results: BTreeMap<String, ExecutionResult>,
    /// Messages in request order, notices first.
    pub messages: Vec<UserMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_target_counts_as_absent() {
        let request = ExecutionRequest::new(Some("   "), ["rename_files"]);
        assert_eq!(request.target(), None);
        let request = ExecutionRequest::new(Some(" /data "), ["rename_files"]);
        assert_eq!(request.target(), Some("/data"));
    }

    #[test]
    fn rejection_detail_includes_path() {
        let rejection = Rejection::TargetMissing {
            path: PathBuf::from("/nope"),
        };
        assert_eq!(rejection.detail(), "target path does not exist: /nope");
        assert_eq!(
            Rejection::NoOperationSelected.detail(),
            "no operation selected"
        );
    }
}
