//! Validates a request and runs its operations in order.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use ordo_config::DirectoryLayout;
use ordo_ops::OperationParams;
use ordo_telemetry::Metrics;
use tracing::{info, warn};

use crate::executor::{Execution, Executor};
use crate::model::{
    ExecutionRequest, Rejection, RunSummary, Severity, UserMessage, ValidatedTarget,
};
use crate::package::Packager;
use crate::registry::OperationRegistry;
use crate::validate::validate;

const PRODUCED_NOTHING: &str = " (ran but produced nothing)";

/// Validator, executor and packager wired to one set of directories.
#[derive(Clone)]
pub struct Engine {
    executor: Executor,
    packager: Packager,
    default_output_dir: PathBuf,
}

impl Engine {
    /// Engine over `registry` using the shared directory layout.
    #[must_use]
    pub fn new(
        registry: Arc<OperationRegistry>,
        directories: &DirectoryLayout,
        metrics: Metrics,
    ) -> Self {
        Self {
            executor: Executor::new(
                registry,
                directories.log_dir.clone(),
                directories.backup_dir.clone(),
                metrics.clone(),
            ),
            packager: Packager::new(directories.temp_dir.clone(), metrics),
            default_output_dir: directories.default_output_dir.clone(),
        }
    }

    /// Registry backing this engine.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        self.executor.registry()
    }

    /// Validate `request` and run every distinct operation it names.
    ///
    /// Blocks until the last operation finishes.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when the request is refused before any
    /// operation runs.
    pub fn run(&self, request: &ExecutionRequest) -> Result<RunSummary, Rejection> {
        let target = validate(
            request.target(),
            &request.operation_ids,
            self.registry(),
            &self.default_output_dir,
        )
        .inspect_err(|rejection| warn!(reason = %rejection.detail(), "request rejected"))?;
        Ok(self.run_all(
            &target,
            &request.operation_ids,
            &request.params,
            request.dry_run,
        ))
    }

    /// Run `operation_ids` sequentially against an already validated target.
    ///
    /// Repeated ids run once; the first occurrence fixes the position of its
    /// message.
    #[must_use]
    pub fn run_all(
        &self,
        target: &ValidatedTarget,
        operation_ids: &[String],
        params: &OperationParams,
        dry_run: bool,
    ) -> RunSummary {
        info!(
            path = %target.path.display(),
            operations = operation_ids.len(),
            dry_run,
            "batch started"
        );
        let notices: Vec<String> = target.notice.iter().cloned().collect();
        let mut messages: Vec<UserMessage> = notices
            .iter()
            .map(|notice| UserMessage {
                severity: Severity::Info,
                text: notice.clone(),
            })
            .collect();
        let mut results = BTreeMap::new();
        let mut seen = HashSet::new();

        for id in operation_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let Execution {
                mut result,
                manifest,
            } = self.executor.execute(id, &target.path, params, dry_run);

            let artifact_label = self
                .registry()
                .get(id)
                .and_then(|descriptor| descriptor.artifact_label);
            if let (Some(label), Some(manifest)) = (artifact_label, manifest.as_ref())
                && result.succeeded()
                && !dry_run
            {
                result.download_link = self.packager.package(label, manifest);
                if result.download_link.is_none() {
                    result.severity = Severity::Warning;
                    result.user_message.push_str(PRODUCED_NOTHING);
                }
            }

            messages.push(UserMessage {
                severity: result.severity,
                text: result.user_message.clone(),
            });
            results.insert(id.clone(), result);
        }

        RunSummary {
            target: target.path.clone(),
            notices,
            results,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::model::ExecutionStatus;
    use crate::registry::{InputKind, OperationDescriptor};
    use ordo_ops::{Invocation, Manifest, OpsResult, params};
    use walkdir::WalkDir;

    type TestResult<T> = anyhow::Result<T>;

    struct Fixture {
        _root: tempfile::TempDir,
        layout: DirectoryLayout,
        target: PathBuf,
    }

    impl Fixture {
        fn new() -> TestResult<Self> {
            let root = tempfile::tempdir()?;
            let layout = DirectoryLayout {
                log_dir: root.path().join("logs"),
                temp_dir: root.path().join("temp"),
                default_output_dir: root.path().join("downloads"),
                backup_dir: root.path().join("Backups"),
            };
            fs::create_dir_all(&layout.log_dir)?;
            fs::create_dir_all(&layout.temp_dir)?;
            let target = root.path().join("target");
            fs::create_dir_all(&target)?;
            Ok(Self {
                _root: root,
                layout,
                target,
            })
        }

        fn builtin(&self) -> TestResult<Engine> {
            Ok(Engine::new(
                Arc::new(OperationRegistry::builtin()?),
                &self.layout,
                Metrics::new()?,
            ))
        }

        fn request(&self, ids: &[&str]) -> ExecutionRequest {
            ExecutionRequest::new(self.target.to_str(), ids.iter().copied())
        }
    }

    fn keys(summary: &RunSummary) -> BTreeSet<&str> {
        summary.results.keys().map(String::as_str).collect()
    }

    fn snapshot(dir: &Path) -> TestResult<Vec<(PathBuf, Vec<u8>)>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let bytes = if entry.file_type().is_file() {
                fs::read(entry.path())?
            } else {
                Vec::new()
            };
            entries.push((entry.path().strip_prefix(dir)?.to_path_buf(), bytes));
        }
        Ok(entries)
    }

    #[test]
    fn summary_keys_match_requested_ids() -> TestResult<()> {
        let fixture = Fixture::new()?;
        let engine = fixture.builtin()?;

        let all: Vec<&str> = engine.registry().ids().collect();
        let summary = engine.run(&fixture.request(&all).dry_run(true))?;
        assert_eq!(keys(&summary), all.iter().copied().collect::<BTreeSet<_>>());
        assert_eq!(summary.messages.len(), all.len());

        let summary = engine.run(&fixture.request(&["nonexistent_op"]))?;
        assert_eq!(keys(&summary), BTreeSet::from(["nonexistent_op"]));

        let rejected = engine.run(&fixture.request(&[]));
        assert!(matches!(rejected, Err(Rejection::NoOperationSelected)));
        Ok(())
    }

    #[test]
    fn url_only_requests_use_the_default_directory() -> TestResult<()> {
        let fixture = Fixture::new()?;
        let engine = fixture.builtin()?;
        let summary = engine.run(&ExecutionRequest::new(None, ["download_playlist"]))?;

        assert_eq!(summary.target, fixture.layout.default_output_dir);
        assert_eq!(summary.notices.len(), 1);
        assert_eq!(summary.messages[0].severity, Severity::Info);
        let playlist = &summary.results["download_playlist"];
        assert_eq!(playlist.user_message, "Please enter a playlist URL.");
        Ok(())
    }

    #[test]
    fn missing_path_rejects_before_running() -> TestResult<()> {
        let fixture = Fixture::new()?;
        let engine = fixture.builtin()?;
        let rejected = engine.run(&ExecutionRequest::new(
            None,
            ["download_playlist", "rename_files"],
        ));
        assert!(matches!(rejected, Err(Rejection::PathRequired)));
        assert_eq!(fs::read_dir(&fixture.layout.log_dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn one_failure_does_not_hide_another_success() -> TestResult<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.target.join("clip.@@@"), b"video")?;
        let engine = fixture.builtin()?;

        let summary = engine.run(&fixture.request(&["rename_files", "nonexistent_op", "rename_files"]))?;
        assert_eq!(summary.results.len(), 2);
        assert_eq!(summary.messages.len(), 2);
        assert_eq!(summary.results["rename_files"].status, ExecutionStatus::Success);
        let unknown = &summary.results["nonexistent_op"];
        assert_eq!(unknown.status, ExecutionStatus::Failure);
        assert!(unknown.user_message.contains("nonexistent_op"));
        assert!(unknown.user_message.contains("unknown operation"));
        assert!(fixture.target.join("clip.mp4").exists());
        Ok(())
    }

    #[test]
    fn dry_runs_are_repeatable_and_leave_files_alone() -> TestResult<()> {
        let fixture = Fixture::new()?;
        fs::write(fixture.target.join("clip.@@@"), b"video")?;
        fs::write(fixture.target.join("archive"), b"zip bytes")?;
        fs::write(fixture.target.join("Holiday Photo (2).jpg"), b"jpeg")?;
        fs::create_dir_all(fixture.target.join("nested"))?;
        fs::write(fixture.target.join("nested/notes 2019.txt"), b"notes")?;
        let before = snapshot(&fixture.target)?;

        let engine = fixture.builtin()?;
        let ids = [
            "rename_files",
            "smart_rename",
            "segregate_by_size",
            "segregate_by_year",
            "sort_move_files",
        ];
        let request = fixture
            .request(&ids)
            .dry_run(true)
            .param(params::DESTINATION_MODE, "2");
        let first = engine.run(&request)?;
        let second = engine.run(&request)?;

        for id in ids {
            let (a, b) = (&first.results[id], &second.results[id]);
            assert_eq!(a.status, ExecutionStatus::Success, "{id}: {}", a.user_message);
            assert_eq!((a.acted_on, a.skipped), (b.acted_on, b.skipped), "{id}");
        }
        assert!(first.results["rename_files"].acted_on.unwrap_or_default() >= 2);
        assert_eq!(snapshot(&fixture.target)?, before);
        Ok(())
    }

    fn three_outputs(invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        fs::write(invocation.log_path, b"line one\nline two\n").ok();
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

    fn no_outputs(_: &Invocation<'_>) -> OpsResult<Manifest> {
        Ok(Manifest::counts(0, 0))
    }

    fn fake_engine(fixture: &Fixture) -> TestResult<Engine> {
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
            .register(
                OperationDescriptor::new(
                    "no_outputs",
                    "No outputs",
                    InputKind::FileOrDir,
                    "none_log",
                    no_outputs,
                )
                .packaged_as("OCR_Results"),
            )
            .build()?;
        Ok(Engine::new(Arc::new(registry), &fixture.layout, Metrics::new()?))
    }

    #[test]
    fn generated_files_are_packaged_and_logs_round_trip() -> TestResult<()> {
        let fixture = Fixture::new()?;
        let engine = fake_engine(&fixture)?;
        let summary = engine.run(&fixture.request(&["three_outputs", "no_outputs"]))?;

        let packaged = &summary.results["three_outputs"];
        let link = packaged
            .download_link
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing download link"))?;
        assert!(link.ends_with(".zip"));
        assert!(fixture.layout.temp_dir.join(link).is_file());

        let log_name = packaged
            .log_file_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("missing log"))?;
        assert_eq!(
            fs::read(fixture.layout.log_dir.join(log_name))?,
            b"line one\nline two\n"
        );

        let empty = &summary.results["no_outputs"];
        assert_eq!(empty.download_link, None);
        assert_eq!(empty.severity, Severity::Warning);
        assert!(empty.user_message.ends_with(PRODUCED_NOTHING));
        Ok(())
    }

    #[test]
    fn dry_runs_are_never_packaged() -> TestResult<()> {
        let fixture = Fixture::new()?;
        let engine = fake_engine(&fixture)?;
        let summary = engine.run(&fixture.request(&["three_outputs"]).dry_run(true))?;
        assert_eq!(summary.results["three_outputs"].download_link, None);
        assert_eq!(fs::read_dir(&fixture.layout.temp_dir)?.count(), 0);
        Ok(())
    }
}
