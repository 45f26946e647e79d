//! Typed configuration values.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use ordo_telemetry::{LogFormat, LoggingConfig};

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 5000;
/// Default interval between janitor sweeps.
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(600);
/// Default age after which transient artifacts are deleted.
pub const DEFAULT_ARTIFACT_RETENTION: Duration = Duration::from_secs(3600);

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,
    /// Directories shared by every request.
    pub directories: DirectoryLayout,
    /// Transient artifact sweep policy.
    pub janitor: JanitorPolicy,
    /// Logging settings.
    pub logging: LogSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub bind_addr: IpAddr,
    /// TCP port, never zero.
    pub http_port: u16,
}

impl ListenerConfig {
    /// Socket address for the listener.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

/// Absolute directories used by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    /// One text log per operation run.
    pub log_dir: PathBuf,
    /// Packaged downloads subject to the janitor sweep.
    pub temp_dir: PathBuf,
    /// Target substituted for URL-only requests without a path.
    pub default_output_dir: PathBuf,
    /// Root for git work backups.
    pub backup_dir: PathBuf,
}

impl DirectoryLayout {
    /// Every directory paired with its role name.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, &PathBuf); 4] {
        [
            ("log_dir", &self.log_dir),
            ("temp_dir", &self.temp_dir),
            ("default_output_dir", &self.default_output_dir),
            ("backup_dir", &self.backup_dir),
        ]
    }
}

/// Transient artifact sweep policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JanitorPolicy {
    /// Delay between sweeps.
    pub interval: Duration,
    /// Files older than this are deleted.
    pub retention: Duration,
}

impl Default for JanitorPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_JANITOR_INTERVAL,
            retention: DEFAULT_ARTIFACT_RETENTION,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Borrow these settings as a telemetry logging configuration.
    #[must_use]
    pub fn logging_config<'a>(&'a self, build_sha: &'a str) -> LoggingConfig<'a> {
        LoggingConfig {
            level: &self.level,
            format: self.format,
            build_sha,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: ordo_telemetry::DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::infer(),
        }
    }
}
