//! State shared by every handler.

use std::path::{Path, PathBuf};

use ordo_config::DirectoryLayout;
use ordo_engine::Engine;
use ordo_telemetry::Metrics;

/// Engine plus the directories downloads are served from.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) engine: Engine,
    pub(crate) telemetry: Metrics,
    log_dir: PathBuf,
    temp_dir: PathBuf,
}

impl ApiState {
    /// State over `engine`, serving files from the layout's log and temp directories.
    #[must_use]
    pub fn new(engine: Engine, directories: &DirectoryLayout, telemetry: Metrics) -> Self {
        Self {
            engine,
            telemetry,
            log_dir: directories.log_dir.clone(),
            temp_dir: directories.temp_dir.clone(),
        }
    }

    pub(crate) fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub(crate) fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}
