//! Runs one operation behind a uniform contract.
//!
//! # Design
//! - Every outcome, including unknown ids and panics, becomes an [`ExecutionResult`].
//! - The log file is reserved with create-new semantics before the operation
//!   starts, so two runs never share a log even within the same second.

use std::any::Any;
use std::fs::OpenOptions;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Local;
use ordo_ops::{Invocation, Manifest, OperationParams, OpsResult};
use ordo_telemetry::{Metrics, OperationOutcome};
use tracing::{error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::model::{ExecutionResult, ExecutionStatus, Severity};
use crate::registry::{OperationDescriptor, OperationRegistry};

const LOG_EXTENSION: &str = "txt";
const UNKNOWN_LABEL: &str = "unknown";

/// Outcome of one execution, with the manifest kept for packaging.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Normalised result.
    pub result: ExecutionResult,
    /// Manifest returned by the implementation, if it returned one.
    pub manifest: Option<Manifest>,
}

impl Execution {
    const fn failed(result: ExecutionResult) -> Self {
        Self {
            result,
            manifest: None,
        }
    }
}

/// Dispatches operation ids to their implementations.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<OperationRegistry>,
    log_dir: PathBuf,
    backup_dir: PathBuf,
    metrics: Metrics,
}

impl Executor {
    /// Executor writing run logs below `log_dir`.
    #[must_use]
    pub const fn new(
        registry: Arc<OperationRegistry>,
        log_dir: PathBuf,
        backup_dir: PathBuf,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            log_dir,
            backup_dir,
            metrics,
        }
    }

    /// Registry the executor resolves ids against.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Run `operation_id` against `target`.
    ///
    /// Never fails: unknown ids, missing parameters, errors and panics are all
    /// reported through the returned result.
    #[must_use]
    pub fn execute(
        &self,
        operation_id: &str,
        target: &Path,
        params: &OperationParams,
        dry_run: bool,
    ) -> Execution {
        let started = Instant::now();
        let Some(descriptor) = self.registry.get(operation_id) else {
            warn!(operation = operation_id, "unknown operation requested");
            self.metrics
                .observe_operation(UNKNOWN_LABEL, OperationOutcome::Failure, started.elapsed());
            return Execution::failed(ExecutionResult::failure(
                operation_id,
                Severity::Danger,
                format!("{operation_id}: unknown operation"),
                None,
            ));
        };

        if let Some(missing) = descriptor
            .required_params
            .iter()
            .find(|required| params.get(required.name).is_none())
        {
            warn!(
                operation = descriptor.id,
                param = missing.name,
                "required parameter missing"
            );
            self.metrics
                .observe_operation(descriptor.id, OperationOutcome::Failure, started.elapsed());
            return Execution::failed(ExecutionResult::failure(
                descriptor.id,
                Severity::Danger,
                missing.message.to_string(),
                None,
            ));
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let log_path = match reserve_log(&self.log_dir, descriptor.log_prefix, &stamp) {
            Ok(path) => path,
            Err(err) => {
                error!(operation = descriptor.id, error = %err, "could not reserve run log");
                self.metrics
                    .observe_operation(descriptor.id, OperationOutcome::Failure, started.elapsed());
                return Execution::failed(ExecutionResult::failure(
                    descriptor.id,
                    Severity::Danger,
                    format!("{} failed: could not create log file", descriptor.id),
                    None,
                ));
            }
        };
        let log_file_name = basename(&log_path);

        info!(
            operation = descriptor.id,
            path = %target.display(),
            dry_run,
            log = %log_file_name,
            "operation started"
        );
        let invocation = Invocation {
            target,
            dry_run,
            log_path: &log_path,
            params,
            backup_dir: &self.backup_dir,
        };
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| descriptor.operation().run(&invocation)));
        self.settle(descriptor, outcome, log_file_name, started, dry_run)
    }

    /// Normalise whatever the implementation produced.
    fn settle(
        &self,
        descriptor: &OperationDescriptor,
        outcome: thread::Result<OpsResult<Manifest>>,
        log_file_name: String,
        started: Instant,
        dry_run: bool,
    ) -> Execution {
        let elapsed = started.elapsed();
        match outcome {
            Ok(Ok(manifest)) => {
                if let Some(message) = manifest.error.clone() {
                    warn!(operation = descriptor.id, error = %message, "operation soft failure");
                    self.metrics
                        .observe_operation(descriptor.id, OperationOutcome::SoftFailure, elapsed);
                    let result = ExecutionResult {
                        acted_on: manifest.acted_on,
                        skipped: manifest.skipped,
                        ..ExecutionResult::failure(
                            descriptor.id,
                            Severity::Warning,
                            message,
                            Some(log_file_name),
                        )
                    };
                    return Execution {
                        result,
                        manifest: Some(manifest),
                    };
                }
                info!(
                    operation = descriptor.id,
                    acted_on = ?manifest.acted_on,
                    skipped = ?manifest.skipped,
                    elapsed = ?elapsed,
                    "operation finished"
                );
                self.metrics
                    .observe_operation(descriptor.id, OperationOutcome::Success, elapsed);
                let result = ExecutionResult {
                    operation_id: descriptor.id.to_string(),
                    status: ExecutionStatus::Success,
                    severity: Severity::Success,
                    user_message: success_message(descriptor, &manifest, dry_run),
                    log_file_name: Some(log_file_name),
                    download_link: None,
                    acted_on: manifest.acted_on,
                    skipped: manifest.skipped,
                };
                Execution {
                    result,
                    manifest: Some(manifest),
                }
            }
            Ok(Err(err)) => {
                let detail = err.detail();
                error!(operation = descriptor.id, error = %detail, "operation failed");
                self.metrics
                    .observe_operation(descriptor.id, OperationOutcome::Failure, elapsed);
                Execution::failed(ExecutionResult::failure(
                    descriptor.id,
                    Severity::Danger,
                    format!("{} failed: {detail}", descriptor.id),
                    Some(log_file_name),
                ))
            }
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                error!(operation = descriptor.id, error = %detail, "operation panicked");
                self.metrics
                    .observe_operation(descriptor.id, OperationOutcome::Failure, elapsed);
                Execution::failed(ExecutionResult::failure(
                    descriptor.id,
                    Severity::Danger,
                    format!("{} failed: {detail}", descriptor.id),
                    Some(log_file_name),
                ))
            }
        }
    }
}

fn success_message(descriptor: &OperationDescriptor, manifest: &Manifest, dry_run: bool) -> String {
    let prefix = if dry_run { "[Dry Run] " } else { "" };
    match (manifest.acted_on, manifest.skipped) {
        (Some(acted_on), Some(skipped)) => format!(
            "{prefix}{} completed. {acted_on} processed, {skipped} skipped.",
            descriptor.label
        ),
        (Some(acted_on), None) => {
            format!("{prefix}{} completed. {acted_on} processed.", descriptor.label)
        }
        _ => format!(
            "{prefix}{} completed. Check logs for details.",
            descriptor.label
        ),
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "operation panicked".to_string(),
            |message| format!("operation panicked: {message}"),
        )
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned())
}

/// Create `{prefix}_{stamp}.txt`, appending `_{n}` while the name is taken.
fn reserve_log(log_dir: &Path, prefix: &str, stamp: &str) -> EngineResult<PathBuf> {
    let mut attempt = 0_u32;
    loop {
        let name = if attempt == 0 {
            format!("{prefix}_{stamp}.{LOG_EXTENSION}")
        } else {
            format!("{prefix}_{stamp}_{attempt}.{LOG_EXTENSION}")
        };
        let path = log_dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(EngineError::io("executor.reserve_log", path, source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::registry::{InputKind, RequiredParam};
    use ordo_ops::{OperationLog, OpsError};

    type TestResult<T> = anyhow::Result<T>;

    fn writes_log(invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line("touched nothing")?;
        log.finish()?;
        Ok(Manifest::counts(4, 1))
    }

    fn soft(invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        OperationLog::open(invocation.log_path)?.soft_failure("yt-dlp is not installed or not on PATH")
    }

    fn hard(_: &Invocation<'_>) -> OpsResult<Manifest> {
        Err(OpsError::ToolMissing { tool: "tesseract" })
    }

    fn panics(_: &Invocation<'_>) -> OpsResult<Manifest> {
        panic!("boom")
    }

    fn silent(_: &Invocation<'_>) -> OpsResult<Manifest> {
        Ok(Manifest::unknown())
    }

    const NEEDS_DATE: &[RequiredParam] = &[RequiredParam {
        name: "target_date",
        message: "Please select a target date.",
    }];

    fn executor(log_dir: &Path) -> TestResult<Executor> {
        let kind = InputKind::RequiresExistingPath;
        let registry = OperationRegistry::builder()
            .register(OperationDescriptor::new("writes_log", "Writer", kind, "writer_log", writes_log))
            .register(OperationDescriptor::new("soft", "Soft", kind, "soft_log", soft))
            .register(OperationDescriptor::new("hard", "Hard", kind, "hard_log", hard))
            .register(OperationDescriptor::new("panics", "Panics", kind, "panic_log", panics))
            .register(OperationDescriptor::new("silent", "Silent", kind, "silent_log", silent))
            .register(
                OperationDescriptor::new("dated", "Dated", kind, "dated_log", silent)
                    .requires(NEEDS_DATE),
            )
            .build()?;
        Ok(Executor::new(
            Arc::new(registry),
            log_dir.to_path_buf(),
            log_dir.join("backups"),
            Metrics::new()?,
        ))
    }

    #[test]
    fn success_reports_counts_and_log() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let executor = executor(dir.path())?;
        let execution = executor.execute("writes_log", dir.path(), &OperationParams::new(), false);
        let result = execution.result;
        assert!(result.succeeded());
        assert_eq!(result.user_message, "Writer completed. 4 processed, 1 skipped.");
        let log_name = result
            .log_file_name
            .ok_or_else(|| anyhow::anyhow!("log name missing"))?;
        assert!(log_name.starts_with("writer_log_") && log_name.ends_with(".txt"));
        assert!(fs::read_to_string(dir.path().join(log_name))?.contains("touched nothing"));
        Ok(())
    }

    #[test]
    fn soft_failures_keep_the_log() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let result = executor(dir.path())?
            .execute("soft", dir.path(), &OperationParams::new(), false)
            .result;
        assert_eq!(result.status, ExecutionStatus::Failure);
        assert_eq!(result.severity, Severity::Warning);
        assert_eq!(result.user_message, "yt-dlp is not installed or not on PATH");
        assert!(result.log_file_name.is_some());
        assert_eq!(result.acted_on, Some(0));
        Ok(())
    }

    #[test]
    fn errors_and_panics_become_failures() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let executor = executor(dir.path())?;
        let params = OperationParams::new();

        let hard = executor.execute("hard", dir.path(), &params, false);
        assert!(hard.manifest.is_none());
        assert_eq!(hard.result.severity, Severity::Danger);
        assert!(hard.result.user_message.starts_with("hard failed:"));
        assert!(hard.result.user_message.contains("tesseract"));
        assert_eq!(hard.result.acted_on, None);

        let panicked = executor.execute("panics", dir.path(), &params, false).result;
        assert_eq!(panicked.status, ExecutionStatus::Failure);
        assert!(panicked.user_message.contains("panics failed"));
        assert!(panicked.user_message.contains("boom"));
        Ok(())
    }

    #[test]
    fn unknown_ids_and_missing_params_fail_locally() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let executor = executor(dir.path())?;
        let params = OperationParams::new();

        let unknown = executor.execute("nonexistent_op", dir.path(), &params, false).result;
        assert_eq!(unknown.user_message, "nonexistent_op: unknown operation");
        assert_eq!(unknown.log_file_name, None);

        let dated = executor.execute("dated", dir.path(), &params, false).result;
        assert_eq!(dated.user_message, "Please select a target date.");
        let dated = executor
            .execute(
                "dated",
                dir.path(),
                &params.with("target_date", "2024-01-01"),
                true,
            )
            .result;
        assert!(dated.succeeded());
        assert_eq!(
            dated.user_message,
            "[Dry Run] Dated completed. Check logs for details."
        );
        Ok(())
    }

    #[test]
    fn log_names_never_collide() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let first = reserve_log(dir.path(), "rename_ext_log", "20240101_120000")?;
        let second = reserve_log(dir.path(), "rename_ext_log", "20240101_120000")?;
        assert_eq!(basename(&first), "rename_ext_log_20240101_120000.txt");
        assert_eq!(basename(&second), "rename_ext_log_20240101_120000_1.txt");
        Ok(())
    }
}
