//! Snapshot of uncommitted work in a git repository.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{OpsError, OpsResult};
use crate::fsutil::{file_name_string, unique_destination};
use crate::log::OperationLog;
use crate::model::{Invocation, Manifest, Operation};
use crate::tool::{ExternalTool, ResolvedTool};

const DETACHED_HEAD: &str = "detached_head";

/// Thin wrapper running `git -C <dir> ...`.
struct Git<'a> {
    tool: &'a ResolvedTool,
    dir: &'a Path,
}

impl Git<'_> {
    fn run(&self, args: &[&str]) -> OpsResult<Option<Vec<u8>>> {
        let mut full = vec![OsStr::new("-C"), self.dir.as_os_str()];
        full.extend(args.iter().map(OsStr::new));
        let output = self.tool.output(full)?;
        Ok(output.status.success().then_some(output.stdout))
    }

    fn text(&self, args: &[&str]) -> OpsResult<Option<String>> {
        Ok(self
            .run(args)?
            .map(|stdout| String::from_utf8_lossy(&stdout).trim().to_string()))
    }

    /// NUL-separated path list relative to `dir`.
    fn paths(&self, args: &[&str]) -> OpsResult<Vec<String>> {
        Ok(self
            .run(args)?
            .map(|stdout| split_nul(&stdout))
            .unwrap_or_default())
    }
}

fn split_nul(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|byte| *byte == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| String::from_utf8_lossy(entry).into_owned())
        .collect()
}

fn branch_folder(branch: Option<&str>) -> &str {
    match branch {
        None | Some("" | "HEAD") => DETACHED_HEAD,
        Some(name) => name,
    }
}

/// Copies untracked and modified files of the repository at the target into a
/// timestamped folder under the backup root.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupGitWork;

impl BackupGitWork {
    fn copy_group(
        log: &mut OperationLog,
        dry_run: bool,
        repo_root: &Path,
        files: &[String],
        dest_dir: &Path,
        label: &str,
    ) -> OpsResult<(u64, u64)> {
        if files.is_empty() {
            log.line(format!("No {label} files found."))?;
            return Ok((0, 0));
        }
        log.line(format!("Found {} {label} files.", files.len()))?;
        if !dry_run {
            fs::create_dir_all(dest_dir)
                .map_err(|source| OpsError::io("backup_git_work.create_dir", dest_dir, source))?;
        }
        let (mut copied, mut skipped) = (0_u64, 0_u64);
        for relative in files {
            let source = repo_root.join(relative);
            if !source.is_file() {
                log.line(format!("Source file missing (deleted?): {}", source.display()))?;
                skipped += 1;
                continue;
            }
            let destination = unique_destination(dest_dir, source.file_name().unwrap_or_default());
            if dry_run {
                log.line(format!(
                    "[Dry Run] Would copy: {relative} -> {}",
                    destination.display()
                ))?;
                copied += 1;
                continue;
            }
            match fs::copy(&source, &destination) {
                Ok(_) => copied += 1,
                Err(err) => {
                    log.line(format!("Error copying {relative}: {err}"))?;
                    skipped += 1;
                }
            }
        }
        log.line(format!("Copied {copied} {label} files to {}", file_name_string(dest_dir)))?;
        Ok((copied, skipped))
    }
}

impl Operation for BackupGitWork {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line(format!("Analyzing Git Repository: {}", target.display()))?;
        let Some(git) = ExternalTool::GIT.resolve() else {
            return log.soft_failure(ExternalTool::GIT.missing_message());
        };

        let probe = Git { tool: &git, dir: target };
        let Some(root) = probe
            .text(&["rev-parse", "--show-toplevel"])?
            .filter(|root| !root.is_empty())
        else {
            return log.soft_failure(format!(
                "'{}' is not a valid Git repository.",
                target.display()
            ));
        };
        let repo_root = PathBuf::from(root);
        let repo = Git { tool: &git, dir: &repo_root };
        let branch = repo.text(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let stamp = Local::now().format("%d%b%y_%H%M");
        let backup_root = invocation
            .backup_dir
            .join(format!("{}_Backups", file_name_string(&repo_root)))
            .join(format!("{}_{stamp}", branch_folder(branch.as_deref())));
        log.line(format!("Backup target: {}", backup_root.display()))?;

        let untracked = repo.paths(&["ls-files", "--others", "--exclude-standard", "-z"])?;
        let changed = repo.paths(&["diff", "--name-only", "-z"])?;

        let (copied_untracked, skipped_untracked) = Self::copy_group(
            &mut log,
            invocation.dry_run,
            &repo_root,
            &untracked,
            &backup_root.join("untracked"),
            "untracked",
        )?;
        let (copied_changed, skipped_changed) = Self::copy_group(
            &mut log,
            invocation.dry_run,
            &repo_root,
            &changed,
            &backup_root.join("changed"),
            "modified",
        )?;

        log.finish()?;
        Ok(Manifest::counts(
            copied_untracked + copied_changed,
            skipped_untracked + skipped_changed,
        ))
    }
}
