//! Registry listing and batch execution.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use ordo_engine::ExecutionRequest;
use ordo_telemetry::{current_request_id, current_route};
use tracing::{error, info_span};

use crate::app::state::ApiState;
use crate::http::errors::ApiError;
use crate::models::{OperationEntry, OperationListResponse, RunResponse};

pub(crate) async fn list_operations(
    State(state): State<Arc<ApiState>>,
) -> Json<OperationListResponse> {
    Json(OperationListResponse {
        operations: state
            .engine
            .registry()
            .descriptors()
            .iter()
            .map(OperationEntry::from)
            .collect(),
    })
}

/// Run the requested batch on the blocking pool and return its summary.
///
/// Operations block for their full duration, so the handler holds the
/// response until the last one finishes.
pub(crate) async fn run_operations(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let engine = state.engine.clone();
    let (request_id, route) = request_scope();

    let outcome = tokio::task::spawn_blocking(move || {
        let span = info_span!("operations.run", request_id = %request_id, route = %route);
        let _entered = span.enter();
        engine.run(&request)
    })
    .await
    .map_err(|err| {
        error!(error = %err, "operation batch task failed");
        ApiError::internal("operation batch did not complete")
    })?;

    let summary = outcome.map_err(|rejection| ApiError::bad_request(rejection.detail()))?;
    Ok(Json(summary.into()))
}

/// Request id and matched route of the calling request, captured before the
/// batch leaves the request task.
fn request_scope() -> (String, String) {
    (
        current_request_id().unwrap_or_default(),
        current_route().unwrap_or_default(),
    )
}
