//! Media library renaming through `mnamer`.

use std::ffi::OsStr;

use crate::error::OpsResult;
use crate::fsutil::require_dir;
use crate::log::OperationLog;
use crate::model::{Invocation, Manifest, Operation};
use crate::tool::ExternalTool;

/// Runs `mnamer` in batch mode over the target tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizeMedia;

impl OrganizeMedia {
    fn arguments(dry_run: bool) -> Vec<&'static str> {
        let mut args = vec!["--batch", "--recurse"];
        if dry_run {
            args.push("--test");
        }
        args
    }
}

impl Operation for OrganizeMedia {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        let Some(mnamer) = ExternalTool::MNAMER.resolve() else {
            return log.soft_failure(ExternalTool::MNAMER.missing_message());
        };

        let mut args: Vec<&OsStr> = Self::arguments(invocation.dry_run)
            .into_iter()
            .map(OsStr::new)
            .collect();
        args.push(target.as_os_str());
        log.line(format!(
            "Running mnamer command: mnamer {}",
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        ))?;

        let output = mnamer.output(&args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            log.line(format!("mnamer output:\n{}", stdout.trim_end()))?;
        }
        if !stderr.trim().is_empty() {
            log.line(format!("mnamer error output:\n{}", stderr.trim_end()))?;
        }
        if !output.status.success() {
            return log.soft_failure(format!("mnamer exited with {}", output.status));
        }
        log.finish()?;
        Ok(Manifest::unknown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_adds_test_flag() {
        assert_eq!(OrganizeMedia::arguments(false), vec!["--batch", "--recurse"]);
        assert_eq!(
            OrganizeMedia::arguments(true),
            vec!["--batch", "--recurse", "--test"]
        );
    }
}
