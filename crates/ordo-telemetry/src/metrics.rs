//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Collector registration is private; callers only see typed increment helpers.
//! - Counters cover the operation lifecycle, artifact packaging and janitor sweeps.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome label recorded for each executed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Manifest returned without an error.
    Success,
    /// Manifest returned with an `error` string.
    SoftFailure,
    /// The operation could not run or raised.
    Failure,
}

impl OperationOutcome {
    /// Label value used in the `operations_total` counter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SoftFailure => "soft_failure",
            Self::Failure => "failure",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    operations_total: IntCounterVec,
    operation_outcomes_total: IntCounterVec,
    artifacts_packaged_total: IntCounterVec,
    artifacts_swept_total: IntCounter,
    artifact_sweep_failures_total: IntCounter,
    last_operation_duration_ms: IntGauge,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Operations that finished with a clean manifest.
    pub operations_succeeded: u64,
    /// Operations that reported a soft failure.
    pub operations_soft_failed: u64,
    /// Operations that failed outright.
    pub operations_failed: u64,
    /// Transient artifacts removed by the janitor.
    pub artifacts_swept_total: u64,
    /// Janitor deletions that failed.
    pub artifact_sweep_failures_total: u64,
    /// Wall-clock duration of the most recent operation (ms).
    pub last_operation_duration_ms: i64,
}

impl Metrics {
    /// Construct a new registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = register(
            &registry,
            "http_requests_total",
            IntCounterVec::new(
                Opts::new("http_requests_total", "Total HTTP requests received"),
                &["route", "code"],
            ),
        )?;
        let operations_total = register(
            &registry,
            "operations_total",
            IntCounterVec::new(
                Opts::new("operations_total", "Operations executed by outcome"),
                &["operation", "status"],
            ),
        )?;
        let operation_outcomes_total = register(
            &registry,
            "operation_outcomes_total",
            IntCounterVec::new(
                Opts::new(
                    "operation_outcomes_total",
                    "Operations executed by outcome across all operation ids",
                ),
                &["status"],
            ),
        )?;
        let artifacts_packaged_total = register(
            &registry,
            "artifacts_packaged_total",
            IntCounterVec::new(
                Opts::new(
                    "artifacts_packaged_total",
                    "Downloadable artifacts staged in the transient directory",
                ),
                &["kind"],
            ),
        )?;
        let artifacts_swept_total = register(
            &registry,
            "artifacts_swept_total",
            IntCounter::with_opts(Opts::new(
                "artifacts_swept_total",
                "Stale transient artifacts deleted by the janitor",
            )),
        )?;
        let artifact_sweep_failures_total = register(
            &registry,
            "artifact_sweep_failures_total",
            IntCounter::with_opts(Opts::new(
                "artifact_sweep_failures_total",
                "Transient artifacts the janitor failed to delete",
            )),
        )?;
        let last_operation_duration_ms = register(
            &registry,
            "last_operation_duration_ms",
            IntGauge::with_opts(Opts::new(
                "last_operation_duration_ms",
                "Duration of the most recently finished operation (ms)",
            )),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                operations_total,
                operation_outcomes_total,
                artifacts_packaged_total,
                artifacts_swept_total,
                artifact_sweep_failures_total,
                last_operation_duration_ms,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Record one finished operation and its duration.
    pub fn observe_operation(&self, operation: &str, outcome: OperationOutcome, elapsed: Duration) {
        self.inner
            .operations_total
            .with_label_values(&[operation, outcome.as_str()])
            .inc();
        self.inner
            .operation_outcomes_total
            .with_label_values(&[outcome.as_str()])
            .inc();
        self.inner
            .last_operation_duration_ms
            .set(Self::duration_to_ms(elapsed));
    }

    /// Count a packaged artifact (`file` or `zip`).
    pub fn inc_artifact_packaged(&self, kind: &str) {
        self.inner
            .artifacts_packaged_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record the outcome of one janitor sweep.
    pub fn record_sweep(&self, removed: u64, failed: u64) {
        self.inner.artifacts_swept_total.inc_by(removed);
        self.inner.artifact_sweep_failures_total.inc_by(failed);
    }

    /// Render the registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the health-relevant counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let outcome_total = |outcome: OperationOutcome| {
            self.inner
                .operation_outcomes_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        MetricsSnapshot {
            operations_succeeded: outcome_total(OperationOutcome::Success),
            operations_soft_failed: outcome_total(OperationOutcome::SoftFailure),
            operations_failed: outcome_total(OperationOutcome::Failure),
            artifacts_swept_total: self.inner.artifacts_swept_total.get(),
            artifact_sweep_failures_total: self.inner.artifact_sweep_failures_total.get(),
            last_operation_duration_ms: self.inner.last_operation_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: prometheus::Result<C>,
) -> Result<C>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector = collector.map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn snapshot_reflects_recorded_operations() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.observe_operation(
            "rename_files",
            OperationOutcome::Success,
            Duration::from_millis(12),
        );
        metrics.observe_operation(
            "smart_rename",
            OperationOutcome::Success,
            Duration::from_millis(30),
        );
        metrics.observe_operation(
            "download_playlist",
            OperationOutcome::SoftFailure,
            Duration::from_millis(5),
        );
        metrics.observe_operation("nonexistent_op", OperationOutcome::Failure, Duration::ZERO);
        metrics.record_sweep(3, 1);
        metrics.inc_artifact_packaged("zip");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations_succeeded, 2);
        assert_eq!(snapshot.operations_soft_failed, 1);
        assert_eq!(snapshot.operations_failed, 1);
        assert_eq!(snapshot.artifacts_swept_total, 3);
        assert_eq!(snapshot.artifact_sweep_failures_total, 1);
        assert_eq!(snapshot.last_operation_duration_ms, 0);
        Ok(())
    }

    #[test]
    fn render_lists_registered_collectors() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.observe_operation("segregate_by_year", OperationOutcome::Success, Duration::ZERO);
        metrics.inc_artifact_packaged("file");
        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("operations_total"));
        assert!(rendered.contains("artifacts_packaged_total"));
        Ok(())
    }
}
