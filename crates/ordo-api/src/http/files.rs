//! Download endpoints for run logs and packaged artifacts.
//!
//! # Design
//! - Files are addressed by plain basename only; anything that could leave the
//!   directory is rejected before touching the filesystem.
//! - Bytes are streamed unmodified as an attachment.

use std::cmp::Reverse;
use std::io;
use std::path::{Component, Path};
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path as UrlPath, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::app::state::ApiState;
use crate::http::constants::{CONTENT_TYPE_BINARY, CONTENT_TYPE_TEXT, CONTENT_TYPE_ZIP};
use crate::http::errors::ApiError;
use crate::models::{LogEntry, LogListResponse};

pub(crate) async fn list_logs(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<LogListResponse>, ApiError> {
    let dir = state.log_dir().to_path_buf();
    let logs = tokio::task::spawn_blocking(move || scan_logs(&dir))
        .await
        .map_err(|err| {
            error!(error = %err, "log listing task failed");
            ApiError::internal("failed to list logs")
        })?
        .map_err(|err| {
            error!(error = %err, "failed to read log directory");
            ApiError::internal("failed to list logs")
        })?;
    Ok(Json(LogListResponse { logs }))
}

pub(crate) async fn download_log(
    State(state): State<Arc<ApiState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Response, ApiError> {
    serve_file(state.log_dir(), &name, "log").await
}

pub(crate) async fn download_artifact(
    State(state): State<Arc<ApiState>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Response, ApiError> {
    serve_file(state.temp_dir(), &name, "artifact").await
}

async fn serve_file(dir: &Path, name: &str, what: &'static str) -> Result<Response, ApiError> {
    if !is_plain_basename(name) {
        warn!(what, name, "rejected download name");
        return Err(ApiError::bad_request(format!("invalid {what} name")));
    }
    let path = dir.join(name);
    let (file, len) = open_regular(&path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ApiError::not_found(format!("{what} not found"))
        } else {
            error!(what, path = %path.display(), error = %err, "failed to read download");
            ApiError::internal(format!("failed to read {what}"))
        }
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(name))
        .header(CONTENT_LENGTH, len)
        .header(CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|err| {
            error!(error = %err, "failed to build download response");
            ApiError::internal("failed to build download response")
        })
}

/// Open `path` for streaming; anything but a regular file reads as not found.
async fn open_regular(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(io::Error::from(io::ErrorKind::NotFound));
    }
    Ok((file, metadata.len()))
}

/// A single normal path component without quoting or control characters.
fn is_plain_basename(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '"']) || name.chars().any(char::is_control) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("txt") => CONTENT_TYPE_TEXT,
        Some("zip") => CONTENT_TYPE_ZIP,
        _ => CONTENT_TYPE_BINARY,
    }
}

/// Regular files in `dir`, newest first. A missing directory lists as empty.
fn scan_logs(dir: &Path) -> io::Result<Vec<LogEntry>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut logs = Vec::new();
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        logs.push(LogEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size_bytes: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    logs.sort_by(|a, b| {
        Reverse(a.modified_at)
            .cmp(&Reverse(b.modified_at))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(logs)
}
