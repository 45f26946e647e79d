//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use ordo_telemetry::{MetricsSnapshot, build_sha};
use serde::Serialize;
use tracing::{error, warn};

use crate::app::state::ApiState;
use crate::http::constants::CONTENT_TYPE_PROMETHEUS;
use crate::http::errors::ApiError;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) build: &'static str,
    pub(crate) operations: usize,
    pub(crate) degraded: Vec<&'static str>,
    pub(crate) metrics: MetricsSnapshot,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let mut degraded = Vec::new();
    for (component, dir) in [
        ("log_dir", state.log_dir()),
        ("temp_dir", state.temp_dir()),
    ] {
        if !dir.is_dir() {
            warn!(component, path = %dir.display(), "health check found directory missing");
            degraded.push(component);
        }
    }
    Json(HealthResponse {
        status: if degraded.is_empty() { "ok" } else { "degraded" },
        build: build_sha(),
        operations: state.engine.registry().descriptors().len(),
        degraded,
        metrics: state.telemetry.snapshot(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let body = state.telemetry.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal("failed to render metrics")
    })?;
    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, CONTENT_TYPE_PROMETHEUS)
        .body(Body::from(body))
        .map_err(|err| {
            error!(error = %err, "failed to build metrics response");
            ApiError::internal("failed to build metrics response")
        })
}
