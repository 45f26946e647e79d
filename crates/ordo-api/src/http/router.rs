//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::{get, post},
};
use ordo_telemetry::build_sha;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, warn};

use crate::app::state::ApiState;
use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::files::{download_artifact, download_log, list_logs};
use crate::http::health::{health, metrics};
use crate::http::operations::{list_operations, run_operations};
use crate::http::telemetry::record_http_request;

/// Axum router wrapper that hosts the ordo API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router with its layers over `state`.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        let state = Arc::new(state);
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_REQUEST_ID)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(ordo_telemetry::set_request_id_layer())
            .layer(ordo_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                record_http_request,
            ));

        let router = Self::routes()
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);
        Self { router }
    }

    fn routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/v1/operations", get(list_operations))
            .route("/v1/operations/run", post(run_operations))
            .route("/v1/logs", get(list_logs))
            .route("/v1/logs/{name}", get(download_log))
            .route("/v1/artifacts/{name}", get(download_artifact))
    }

    /// Serve on `addr` until the process receives Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(addr = %addr, "API listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use ordo_config::DirectoryLayout;
    use ordo_engine::{Engine, InputKind, OperationDescriptor, OperationRegistry};
    use ordo_ops::{Invocation, Manifest, OpsResult};
    use ordo_telemetry::Metrics;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::http::constants::{CONTENT_TYPE_ZIP, PROBLEM_BAD_REQUEST};

    type TestResult<T> = anyhow::Result<T>;

    struct Harness {
        _root: tempfile::TempDir,
        layout: DirectoryLayout,
        target: PathBuf,
        server: ApiServer,
    }

    impl Harness {
        fn new(registry: OperationRegistry) -> TestResult<Self> {
            let root = tempfile::tempdir()?;
            let layout = DirectoryLayout {
                log_dir: root.path().join("logs"),
                temp_dir: root.path().join("temp"),
                default_output_dir: root.path().join("downloads"),
                backup_dir: root.path().join("Backups"),
            };
            for (_, dir) in layout.entries() {
                fs::create_dir_all(dir)?;
            }
            let target = root.path().join("target");
            fs::create_dir_all(&target)?;
            let metrics = Metrics::new()?;
            let engine = Engine::new(Arc::new(registry), &layout, metrics.clone());
            let server = ApiServer::new(ApiState::new(engine, &layout, metrics));
            Ok(Self {
                _root: root,
                layout,
                target,
                server,
            })
        }

        fn builtin() -> TestResult<Self> {
            Self::new(OperationRegistry::builtin()?)
        }

        async fn send(&self, request: Request<Body>) -> TestResult<Response> {
            Ok(self.server.router().clone().oneshot(request).await?)
        }

        async fn get(&self, uri: &str) -> TestResult<Response> {
            self.send(Request::builder().uri(uri).body(Body::empty())?)
                .await
        }

        async fn run(&self, body: &Value) -> TestResult<Response> {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri("/v1/operations/run")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(body)?))?,
            )
            .await
        }

        fn target(&self) -> String {
            self.target.display().to_string()
        }
    }

    async fn json_body(response: Response) -> TestResult<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn three_outputs(invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        fs::write(invocation.log_path, b"packaged three files\n").ok();
        let files = ["a_OCR.txt", "b_OCR.txt", "c_OCR.txt"]
            .iter()
            .map(|name| {
                let path = invocation.target.join(name);
                fs::write(&path, name.as_bytes()).ok();
                path
            })
            .collect();
        Ok(Manifest::counts(3, 0).with_generated_files(files))
    }

    #[tokio::test]
    async fn health_reports_registry_and_request_id() -> TestResult<()> {
        let harness = Harness::builtin()?;
        let response = harness.get("/health").await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(HEADER_REQUEST_ID));
        let body = json_body(response).await?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["operations"], 17);
        assert_eq!(body["metrics"]["operations_failed"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn health_degrades_when_directories_vanish() -> TestResult<()> {
        let harness = Harness::builtin()?;
        fs::remove_dir_all(&harness.layout.temp_dir)?;
        let body = json_body(harness.get("/health").await?).await?;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["degraded"], json!(["temp_dir"]));
        Ok(())
    }

    #[tokio::test]
    async fn operations_are_listed_in_registration_order() -> TestResult<()> {
        let harness = Harness::builtin()?;
        let body = json_body(harness.get("/v1/operations").await?).await?;
        let operations = body["operations"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("operations missing"))?;
        assert_eq!(operations.len(), 17);
        assert_eq!(operations[0]["id"], "segregate_by_year");
        let playlist = operations
            .iter()
            .find(|entry| entry["id"] == "download_playlist")
            .ok_or_else(|| anyhow::anyhow!("download_playlist missing"))?;
        assert_eq!(playlist["input_kind"], "requires_url_only");
        assert_eq!(playlist["required_params"], json!(["playlist_url"]));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_requests_are_bad_request_problems() -> TestResult<()> {
        let harness = Harness::builtin()?;

        let response = harness
            .run(&json!({"target": harness.target(), "operations": []}))
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await?;
        assert_eq!(body["type"], PROBLEM_BAD_REQUEST);
        assert_eq!(body["detail"], "no operation selected");

        let response = harness
            .run(&json!({"target": "  ", "operations": ["rename_files"]}))
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await?["detail"], "please enter a valid path");
        assert_eq!(fs::read_dir(&harness.layout.log_dir)?.count(), 0);

        let response = harness
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/v1/operations/run")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await?["type"], PROBLEM_BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn run_reports_each_operation_and_serves_its_log() -> TestResult<()> {
        let harness = Harness::builtin()?;
        fs::write(harness.target.join("clip.@@@"), b"video")?;

        let response = harness
            .run(&json!({
                "target": harness.target(),
                "operations": ["rename_files", "nonexistent_op"],
                "dry_run": true,
            }))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["results"]["rename_files"]["status"], "success");
        assert_eq!(body["results"]["nonexistent_op"]["status"], "failure");
        assert_eq!(
            body["results"]["nonexistent_op"]["message"],
            "nonexistent_op: unknown operation"
        );
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));
        assert!(harness.target.join("clip.@@@").exists());

        let log_file = body["results"]["rename_files"]["log_file"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("log_file missing"))?
            .to_string();
        assert!(log_file.starts_with("rename_ext_log_"));

        let response = harness.get(&format!("/v1/logs/{log_file}")).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(bytes.as_ref(), fs::read(harness.layout.log_dir.join(&log_file))?);

        let listing = json_body(harness.get("/v1/logs").await?).await?;
        assert_eq!(listing["logs"][0]["name"], log_file.as_str());
        Ok(())
    }

    #[tokio::test]
    async fn packaged_artifacts_download_as_zip() -> TestResult<()> {
        let registry = OperationRegistry::builder()
            .register(
                OperationDescriptor::new(
                    "three_outputs",
                    "Three outputs",
                    InputKind::FileOrDir,
                    "three_log",
                    three_outputs,
                )
                .packaged_as("OCR_Results"),
            )
            .build()?;
        let harness = Harness::new(registry)?;

        let body = json_body(
            harness
                .run(&json!({"target": harness.target(), "operations": ["three_outputs"]}))
                .await?,
        )
        .await?;
        let link = body["results"]["three_outputs"]["download_link"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("download_link missing"))?
            .to_string();
        assert!(link.starts_with("OCR_Results_"));

        let response = harness.get(&format!("/v1/artifacts/{link}")).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], CONTENT_TYPE_ZIP);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(bytes.as_ref(), fs::read(harness.layout.temp_dir.join(&link))?);
        Ok(())
    }

    #[tokio::test]
    async fn downloads_reject_unsafe_or_missing_names() -> TestResult<()> {
        let harness = Harness::builtin()?;
        fs::write(harness.layout.temp_dir.join("..secret"), b"x")?;

        let response = harness.get("/v1/logs/..%2Fsecret.txt").await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = harness.get("/v1/artifacts/missing.zip").await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = harness.get("/v1/artifacts/..secret").await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn requests_are_counted_per_route() -> TestResult<()> {
        let harness = Harness::builtin()?;
        harness.get("/v1/logs/missing.txt").await?;
        let response = harness.get("/metrics").await?;
        assert_eq!(response.status(), StatusCode::OK);
        let text = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await?.to_vec())?;
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("/v1/logs/{name}"));
        Ok(())
    }
}
