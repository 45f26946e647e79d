//! Age-based sweep of the transient artifact directory.

use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use ordo_telemetry::Metrics;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files deleted.
    pub removed: u64,
    /// Files that were stale but could not be deleted.
    pub failed: u64,
}

/// Deletes regular files older than the retention window.
#[derive(Debug, Clone)]
pub struct Janitor {
    dir: PathBuf,
    retention: Duration,
    interval: Duration,
}

impl Janitor {
    /// Janitor for `dir`.
    #[must_use]
    pub const fn new(dir: PathBuf, retention: Duration, interval: Duration) -> Self {
        Self {
            dir,
            retention,
            interval,
        }
    }

    /// Directory being swept.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run a single sweep as of `now`.
    ///
    /// A missing directory is an empty sweep. Per-file failures are logged and
    /// counted; the sweep always visits every entry.
    #[must_use]
    pub fn sweep_once(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(path = %self.dir.display(), error = %err, "transient directory unreadable");
                return report;
            }
        };

        for entry in entries {
            let Some(path) = self.stale_file(entry, now) else {
                continue;
            };
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed stale artifact");
                    report.removed += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove stale artifact");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Path of `entry` when it is a regular file past retention.
    ///
    /// Entries that cannot be inspected are logged and left alone.
    fn stale_file(&self, entry: io::Result<DirEntry>, now: SystemTime) -> Option<PathBuf> {
        let entry = entry
            .inspect_err(|err| {
                warn!(path = %self.dir.display(), error = %err, "failed to read transient entry");
            })
            .ok()?;
        let path = entry.path();
        let metadata = entry
            .metadata()
            .inspect_err(|err| {
                warn!(path = %path.display(), error = %err, "failed to stat transient artifact");
            })
            .ok()?;
        if !metadata.is_file() {
            return None;
        }
        let age = match metadata.modified() {
            Ok(modified) => now.duration_since(modified).unwrap_or_default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "artifact has no modification time");
                return None;
            }
        };
        (age > self.retention).then_some(path)
    }

    /// Sweep on a fixed interval for the life of the process.
    ///
    /// The first sweep runs immediately. Sweeps run on the blocking pool.
    #[must_use]
    pub fn spawn(self, metrics: Metrics) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let janitor = self.clone();
                match tokio::task::spawn_blocking(move || janitor.sweep_once(SystemTime::now()))
                    .await
                {
                    Ok(report) => {
                        metrics.record_sweep(report.removed, report.failed);
                        if report.removed > 0 || report.failed > 0 {
                            info!(
                                removed = report.removed,
                                failed = report.failed,
                                "transient artifact sweep finished"
                            );
                        }
                    }
                    Err(err) => warn!(error = %err, "transient artifact sweep aborted"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    const HOUR: Duration = Duration::from_secs(3600);

    fn backdate(path: &Path, age: Duration) -> TestResult<()> {
        let file = File::options().write(true).open(path)?;
        file.set_modified(SystemTime::now() - age)?;
        Ok(())
    }

    #[test]
    fn only_files_past_retention_are_removed() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let old = dir.path().join("Scraped_Images_1700000000.zip");
        let fresh = dir.path().join("receipt_OCR.txt");
        fs::write(&old, b"old")?;
        fs::write(&fresh, b"fresh")?;
        fs::create_dir(dir.path().join("nested"))?;
        backdate(&old, 2 * HOUR)?;
        backdate(&fresh, Duration::from_secs(300))?;

        let janitor = Janitor::new(dir.path().to_path_buf(), HOUR, Duration::from_secs(600));
        let report = janitor.sweep_once(SystemTime::now());
        assert_eq!(report, SweepReport { removed: 1, failed: 0 });
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(dir.path().join("nested").is_dir());
        Ok(())
    }

    #[test]
    fn unreadable_entries_are_skipped() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let janitor = Janitor::new(dir.path().to_path_buf(), HOUR, HOUR);
        let unreadable = Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(janitor.stale_file(unreadable, SystemTime::now()), None);

        let old = dir.path().join("OCR_Results_2.zip");
        fs::write(&old, b"old")?;
        backdate(&old, 2 * HOUR)?;
        let entry = fs::read_dir(dir.path())?.next();
        let entry = entry.ok_or_else(|| anyhow::anyhow!("entry missing"))?;
        assert_eq!(janitor.stale_file(entry, SystemTime::now()), Some(old));
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_empty_sweep() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let janitor = Janitor::new(dir.path().join("absent"), HOUR, HOUR);
        assert_eq!(janitor.sweep_once(SystemTime::now()), SweepReport::default());
        Ok(())
    }

    #[tokio::test]
    async fn spawned_janitor_sweeps_immediately() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let old = dir.path().join("OCR_Results_1.zip");
        fs::write(&old, b"old")?;
        backdate(&old, 2 * HOUR)?;

        let metrics = Metrics::new()?;
        let handle = Janitor::new(dir.path().to_path_buf(), HOUR, HOUR).spawn(metrics.clone());
        for _ in 0..50 {
            if metrics.snapshot().artifacts_swept_total == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(!old.exists());
        assert_eq!(metrics.snapshot().artifacts_swept_total, 1);
        Ok(())
    }
}
