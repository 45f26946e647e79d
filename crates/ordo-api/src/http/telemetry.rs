//! Request counting middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use ordo_telemetry::with_request_context;

use crate::app::state::ApiState;
use crate::http::constants::HEADER_REQUEST_ID;

/// Count the request per matched route and status, with the request context
/// in scope for the handler.
pub(crate) async fn record_http_request(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let route = req.extensions().get::<MatchedPath>().map_or_else(
        || req.uri().path().to_string(),
        |matched| matched.as_str().to_string(),
    );
    let request_id = req
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = with_request_context(request_id, route.clone(), next.run(req)).await;
    state
        .telemetry
        .inc_http_request(&route, response.status().as_u16());
    response
}
