use std::net::SocketAddr;
use std::sync::Arc;

use ordo_api::ApiServer;
use ordo_api::app::state::ApiState;
use ordo_config::AppConfig;
use ordo_engine::{Engine, Janitor, OperationRegistry};
use ordo_telemetry::{GlobalContextGuard, Metrics, build_sha};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the application.
pub(crate) struct BootstrapDependencies {
    config: AppConfig,
    telemetry: Metrics,
    registry: OperationRegistry,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            AppConfig::from_env().map_err(|err| AppError::config("app_config.from_env", err))?;
        Self::from_config(config)
    }

    pub(crate) fn from_config(config: AppConfig) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let registry = OperationRegistry::builtin()
            .map_err(|err| AppError::engine("registry.builtin", err))?;
        Ok(Self {
            config,
            telemetry,
            registry,
        })
    }
}

/// Services started by [`start_services`].
pub(crate) struct RunningServices {
    api: ApiServer,
    janitor: JoinHandle<()>,
    addr: SocketAddr,
}

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging or the API listener fail.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let logging = dependencies.config.logging.logging_config(build_sha());
    ordo_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("serve");

    info!("ordo bootstrap starting");
    let RunningServices {
        api,
        janitor,
        addr,
    } = start_services(dependencies)?;

    info!(addr = %addr, "launching API listener");
    let serve_result = api.serve(addr).await;

    if !janitor.is_finished() {
        janitor.abort();
    }
    if let Err(err) = janitor.await
        && !err.is_cancelled()
    {
        warn!(error = %err, "janitor join failed");
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("ordo stopped");
    Ok(())
}

/// Prepare directories, start the janitor once and build the API.
pub(crate) fn start_services(dependencies: BootstrapDependencies) -> AppResult<RunningServices> {
    let BootstrapDependencies {
        config,
        telemetry,
        registry,
    } = dependencies;

    config
        .ensure_directories()
        .map_err(|err| AppError::config("app_config.ensure_directories", err))?;

    let janitor = Janitor::new(
        config.directories.temp_dir.clone(),
        config.janitor.retention,
        config.janitor.interval,
    )
    .spawn(telemetry.clone());
    info!(
        dir = %config.directories.temp_dir.display(),
        retention = ?config.janitor.retention,
        interval = ?config.janitor.interval,
        "artifact janitor started"
    );

    let engine = Engine::new(Arc::new(registry), &config.directories, telemetry.clone());
    let api = ApiServer::new(ApiState::new(engine, &config.directories, telemetry));
    Ok(RunningServices {
        api,
        janitor,
        addr: config.listener.socket_addr(),
    })
}
