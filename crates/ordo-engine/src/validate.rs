//! Target validation ahead of any operation running.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::model::{Rejection, ValidatedTarget};
use crate::registry::{InputKind, OperationRegistry};

/// How the selected operations constrain the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Requirements {
    needs_source_path: bool,
    may_create_target: bool,
}

impl Requirements {
    /// Unknown ids behave like operations needing an existing path.
    fn of<'a>(registry: &OperationRegistry, ids: impl IntoIterator<Item = &'a str>) -> Self {
        let kinds = ids.into_iter().map(|id| {
            registry
                .get(id)
                .map_or(InputKind::RequiresExistingPath, |descriptor| descriptor.input_kind)
        });
        let mut requirements = Self {
            needs_source_path: false,
            may_create_target: true,
        };
        for kind in kinds {
            requirements.needs_source_path |= kind.requires_source_path();
            requirements.may_create_target &= kind.may_create_target();
        }
        requirements
    }
}

/// Resolve the request target against the selected operations.
///
/// Rules, in order: at least one operation; a blank target falls back to
/// `default_output_dir` when every operation is URL-only; otherwise a target is
/// required; a missing target is created when every operation treats it as an
/// output root, and rejected otherwise. Existing files pass through untouched.
///
/// # Errors
///
/// Returns the [`Rejection`] explaining why nothing may run.
pub fn validate(
    target: Option<&str>,
    operation_ids: &[String],
    registry: &OperationRegistry,
    default_output_dir: &Path,
) -> Result<ValidatedTarget, Rejection> {
    if operation_ids.is_empty() {
        return Err(Rejection::NoOperationSelected);
    }
    let requirements = Requirements::of(registry, operation_ids.iter().map(String::as_str));

    let (path, notice) = match target {
        Some(target) => (PathBuf::from(target), None),
        None if !requirements.needs_source_path => {
            let notice = format!(
                "No path given; using default download directory {}",
                default_output_dir.display()
            );
            info!(path = %default_output_dir.display(), "substituting default output directory");
            (default_output_dir.to_path_buf(), Some(notice))
        }
        None => return Err(Rejection::PathRequired),
    };

    if !path.exists() {
        if !requirements.may_create_target {
            return Err(Rejection::TargetMissing { path });
        }
        fs::create_dir_all(&path).map_err(|source| Rejection::CreateFailed {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "created output directory for request");
    }

    Ok(ValidatedTarget { path, notice })
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn nothing_selected_is_rejected() -> TestResult<()> {
        let registry = OperationRegistry::builtin()?;
        let result = validate(Some("/tmp"), &[], &registry, Path::new("downloads"));
        assert!(matches!(result, Err(Rejection::NoOperationSelected)));
        Ok(())
    }

    #[test]
    fn url_only_batches_fall_back_to_default_directory() -> TestResult<()> {
        let registry = OperationRegistry::builtin()?;
        let root = tempfile::tempdir()?;
        let default_dir = root.path().join("downloads");

        let validated = validate(None, &ids(&["download_playlist"]), &registry, &default_dir)?;
        assert_eq!(validated.path, default_dir);
        assert!(validated.notice.is_some());
        assert!(default_dir.is_dir());
        Ok(())
    }

    #[test]
    fn mixed_batches_require_a_path() -> TestResult<()> {
        let registry = OperationRegistry::builtin()?;
        let root = tempfile::tempdir()?;
        let result = validate(
            None,
            &ids(&["download_playlist", "rename_files"]),
            &registry,
            root.path(),
        );
        assert!(matches!(result, Err(Rejection::PathRequired)));

        let result = validate(None, &ids(&["nonexistent_op"]), &registry, root.path());
        assert!(matches!(result, Err(Rejection::PathRequired)));
        Ok(())
    }

    #[test]
    fn missing_targets_are_created_only_for_output_roots() -> TestResult<()> {
        let registry = OperationRegistry::builtin()?;
        let root = tempfile::tempdir()?;

        let output = root.path().join("scrapes");
        let validated = validate(
            output.to_str(),
            &ids(&["scrape_images", "download_playlist"]),
            &registry,
            root.path(),
        )?;
        assert_eq!(validated.path, output);
        assert!(validated.notice.is_none());
        assert!(output.is_dir());

        let missing = root.path().join("photos");
        let result = validate(missing.to_str(), &ids(&["rename_files"]), &registry, root.path());
        assert!(matches!(result, Err(Rejection::TargetMissing { .. })));
        assert!(!missing.exists());
        Ok(())
    }

    #[test]
    fn file_targets_pass_through() -> TestResult<()> {
        let registry = OperationRegistry::builtin()?;
        let root = tempfile::tempdir()?;
        let file = root.path().join("scan.png");
        fs::write(&file, b"png")?;
        let validated = validate(file.to_str(), &ids(&["rename_files"]), &registry, root.path())?;
        assert_eq!(validated.path, file);
        Ok(())
    }
}
