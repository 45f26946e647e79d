//! Environment loading and directory preparation.
//!
//! # Design
//! - Every variable is optional; absent values fall back to documented defaults.
//! - Parsing goes through a lookup closure so tests never mutate the process environment.
//! - Relative directories resolve against the working directory once, at load time.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, DirectoryLayout, JanitorPolicy, ListenerConfig, LogSettings};
use crate::validate::{
    non_empty, parse_bind_addr, parse_log_format, parse_port, parse_positive_secs,
};

/// Environment variable names understood by [`AppConfig::from_env`].
pub mod vars {
    /// Listener interface.
    pub const BIND_ADDR: &str = "ORDO_BIND_ADDR";
    /// Listener port.
    pub const HTTP_PORT: &str = "ORDO_HTTP_PORT";
    /// Per-run log directory.
    pub const LOG_DIR: &str = "ORDO_LOG_DIR";
    /// Transient artifact directory.
    pub const TEMP_DIR: &str = "ORDO_TEMP_DIR";
    /// Default output directory for URL-only requests.
    pub const DEFAULT_OUTPUT_DIR: &str = "ORDO_DEFAULT_OUTPUT_DIR";
    /// Root for git work backups.
    pub const BACKUP_DIR: &str = "ORDO_BACKUP_DIR";
    /// Seconds between janitor sweeps.
    pub const JANITOR_INTERVAL_SECS: &str = "ORDO_JANITOR_INTERVAL_SECS";
    /// Artifact retention window in seconds.
    pub const ARTIFACT_RETENTION_SECS: &str = "ORDO_ARTIFACT_RETENTION_SECS";
    /// Default log level.
    pub const LOG_LEVEL: &str = "ORDO_LOG_LEVEL";
    /// Log output format.
    pub const LOG_FORMAT: &str = "ORDO_LOG_FORMAT";
}

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_TEMP_DIR: &str = "temp";
const DEFAULT_OUTPUT_DIR: &str = "downloads";
const DEFAULT_BACKUP_DIR: &str = "Backups";

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value or the working
    /// directory cannot be resolved.
    pub fn from_env() -> ConfigResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|source| ConfigError::WorkingDirectory { source })?;
        Self::from_lookup(&cwd, |name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Relative directories are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_lookup<F>(base_dir: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut listener = ListenerConfig::default();
        if let Some(value) = read(vars::BIND_ADDR) {
            listener.bind_addr = parse_bind_addr(vars::BIND_ADDR, &value)?;
        }
        if let Some(value) = read(vars::HTTP_PORT) {
            listener.http_port = parse_port(vars::HTTP_PORT, &value)?;
        }

        let dir = |name: &'static str, default: &str| {
            let raw = read(name).unwrap_or_else(|| default.to_string());
            resolve_dir(base_dir, raw.trim())
        };
        let directories = DirectoryLayout {
            log_dir: dir(vars::LOG_DIR, DEFAULT_LOG_DIR),
            temp_dir: dir(vars::TEMP_DIR, DEFAULT_TEMP_DIR),
            default_output_dir: dir(vars::DEFAULT_OUTPUT_DIR, DEFAULT_OUTPUT_DIR),
            backup_dir: dir(vars::BACKUP_DIR, DEFAULT_BACKUP_DIR),
        };

        let mut janitor = JanitorPolicy::default();
        if let Some(value) = read(vars::JANITOR_INTERVAL_SECS) {
            janitor.interval = parse_positive_secs(vars::JANITOR_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = read(vars::ARTIFACT_RETENTION_SECS) {
            janitor.retention = parse_positive_secs(vars::ARTIFACT_RETENTION_SECS, &value)?;
        }

        let mut logging = LogSettings::default();
        if let Some(value) = read(vars::LOG_LEVEL) {
            logging.level = non_empty(vars::LOG_LEVEL, &value)?;
        }
        if let Some(value) = read(vars::LOG_FORMAT) {
            logging.format = parse_log_format(vars::LOG_FORMAT, &value)?;
        }

        Ok(Self {
            listener,
            directories,
            janitor,
            logging,
        })
    }

    /// Create every configured directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error naming the directory that could not be created.
    pub fn ensure_directories(&self) -> ConfigResult<()> {
        for (role, path) in self.directories.entries() {
            fs::create_dir_all(path).map_err(|source| ConfigError::Directory {
                role,
                path: path.clone(),
                source,
            })?;
            info!(role, path = %path.display(), "directory ready");
        }
        Ok(())
    }
}

fn resolve_dir(base_dir: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::time::Duration;

    use ordo_telemetry::LogFormat;

    type TestResult<T> = anyhow::Result<T>;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() -> TestResult<()> {
        let base = Path::new("/srv/ordo");
        let config = AppConfig::from_lookup(base, lookup_from(&[]))?;
        assert_eq!(config.listener.http_port, 5000);
        assert!(config.listener.bind_addr.is_loopback());
        assert_eq!(config.directories.log_dir, base.join("logs"));
        assert_eq!(config.directories.temp_dir, base.join("temp"));
        assert_eq!(config.directories.default_output_dir, base.join("downloads"));
        assert_eq!(config.directories.backup_dir, base.join("Backups"));
        assert_eq!(config.janitor.interval, Duration::from_secs(600));
        assert_eq!(config.janitor.retention, Duration::from_secs(3600));
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> TestResult<()> {
        let config = AppConfig::from_lookup(
            Path::new("/srv/ordo"),
            lookup_from(&[
                (vars::BIND_ADDR, "0.0.0.0"),
                (vars::HTTP_PORT, "8088"),
                (vars::LOG_DIR, "/var/log/ordo"),
                (vars::TEMP_DIR, "scratch"),
                (vars::JANITOR_INTERVAL_SECS, "60"),
                (vars::ARTIFACT_RETENTION_SECS, "120"),
                (vars::LOG_LEVEL, "debug"),
                (vars::LOG_FORMAT, "json"),
            ]),
        )?;
        assert_eq!(config.listener.bind_addr, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.listener.socket_addr().port(), 8088);
        assert_eq!(config.directories.log_dir, PathBuf::from("/var/log/ordo"));
        assert_eq!(config.directories.temp_dir, PathBuf::from("/srv/ordo/scratch"));
        assert_eq!(config.janitor.interval, Duration::from_secs(60));
        assert_eq!(config.janitor.retention, Duration::from_secs(120));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let result = AppConfig::from_lookup(
            Path::new("/srv/ordo"),
            lookup_from(&[(vars::HTTP_PORT, "zero")]),
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: vars::HTTP_PORT,
                ..
            })
        ));
    }

    #[test]
    fn ensure_directories_is_idempotent() -> TestResult<()> {
        let root = tempfile::tempdir()?;
        let config = AppConfig::from_lookup(root.path(), lookup_from(&[]))?;
        config.ensure_directories()?;
        config.ensure_directories()?;
        for (_, path) in config.directories.entries() {
            assert!(path.is_dir(), "{} missing", path.display());
        }
        Ok(())
    }
}
