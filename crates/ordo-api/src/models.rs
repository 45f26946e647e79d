//! Wire types for the public HTTP API.
//!
//! Engine types are mapped here so the JSON contract stays stable when the
//! engine's internals move.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ordo_engine::{
    ExecutionResult, ExecutionStatus, InputKind, OperationDescriptor, RunSummary, Severity,
    UserMessage,
};
use serde::Serialize;

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, constant summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One registered operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OperationEntry {
    /// Stable identifier used in run requests.
    pub id: &'static str,
    /// Human label.
    pub label: &'static str,
    /// How the target is interpreted.
    pub input_kind: InputKind,
    /// Prefix of the per-run log file name.
    pub log_prefix: &'static str,
    /// Parameters that must be present and non-blank.
    pub required_params: Vec<&'static str>,
    /// Whether successful runs offer a download.
    pub packaged: bool,
}

impl From<&OperationDescriptor> for OperationEntry {
    fn from(descriptor: &OperationDescriptor) -> Self {
        Self {
            id: descriptor.id,
            label: descriptor.label,
            input_kind: descriptor.input_kind,
            log_prefix: descriptor.log_prefix,
            required_params: descriptor
                .required_params
                .iter()
                .map(|param| param.name)
                .collect(),
            packaged: descriptor.artifact_label.is_some(),
        }
    }
}

/// Registry listing.
#[derive(Debug, Clone, Serialize)]
pub struct OperationListResponse {
    /// Operations in registration order.
    pub operations: Vec<OperationEntry>,
}

/// Outcome of one operation in a run response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OperationResultView {
    /// `success` or `failure`.
    pub status: ExecutionStatus,
    /// Presentation severity.
    pub severity: Severity,
    /// One-line outcome.
    pub message: String,
    /// Basename of the run log; fetch via `/v1/logs/{name}`.
    pub log_file: Option<String>,
    /// Basename of the packaged artifact; fetch via `/v1/artifacts/{name}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_link: Option<String>,
    /// Items acted on, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acted_on: Option<u64>,
    /// Items skipped or failed, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
}

impl From<ExecutionResult> for OperationResultView {
    fn from(result: ExecutionResult) -> Self {
        Self {
            status: result.status,
            severity: result.severity,
            message: result.user_message,
            log_file: result.log_file_name,
            download_link: result.download_link,
            acted_on: result.acted_on,
            skipped: result.skipped,
        }
    }
}

/// Response body of `POST /v1/operations/run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    /// Target the batch ran against.
    pub target: String,
    /// Validation notices.
    pub notices: Vec<String>,
    /// Severity-tagged lines in request order.
    pub messages: Vec<UserMessage>,
    /// Outcome per distinct operation id.
    pub results: BTreeMap<String, OperationResultView>,
}

impl From<RunSummary> for RunResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            target: summary.target.display().to_string(),
            notices: summary.notices,
            messages: summary.messages,
            results: summary
                .results
                .into_iter()
                .map(|(id, result)| (id, result.into()))
                .collect(),
        }
    }
}

/// One run log on disk.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogEntry {
    /// File basename.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time, when the platform reports one.
    pub modified_at: Option<DateTime<Utc>>,
}

/// Log directory listing, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct LogListResponse {
    /// Log files.
    pub logs: Vec<LogEntry>,
}
