//! Filesystem helpers shared by the operation modules.
//!
//! # Design
//! - Listings are collected before any mutation so moves never feed back into the walk.
//! - Listings are sorted, making dry runs and live runs visit files in the same order.

#![allow(clippy::redundant_pub_crate)]

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{OpsError, OpsResult};

pub(crate) fn require_dir(target: &Path) -> OpsResult<()> {
    if target.is_dir() {
        Ok(())
    } else {
        Err(OpsError::InvalidInput {
            field: "target",
            reason: "not_a_directory",
            value: Some(target.display().to_string()),
        })
    }
}

/// Regular files directly inside `dir`.
pub(crate) fn top_level_files(dir: &Path) -> OpsResult<Vec<PathBuf>> {
    let reader = fs::read_dir(dir).map_err(|source| OpsError::io("list.read_dir", dir, source))?;
    let mut files = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|source| OpsError::io("list.entry", dir, source))?;
        let file_type = entry
            .file_type()
            .map_err(|source| OpsError::io("list.file_type", entry.path(), source))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Directories directly inside `dir`.
pub(crate) fn top_level_dirs(dir: &Path) -> OpsResult<Vec<PathBuf>> {
    let reader = fs::read_dir(dir).map_err(|source| OpsError::io("list.read_dir", dir, source))?;
    let mut dirs = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|source| OpsError::io("list.entry", dir, source))?;
        let file_type = entry
            .file_type()
            .map_err(|source| OpsError::io("list.file_type", entry.path(), source))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Regular files anywhere below `dir`, skipping subtrees for which `prune` returns true.
pub(crate) fn walk_files<P>(dir: &Path, prune: P) -> OpsResult<Vec<PathBuf>>
where
    P: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !(entry.file_type().is_dir() && prune(entry.path())));
    for entry in walker {
        let entry = entry.map_err(|source| OpsError::walkdir("walk", dir, source))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Lower-cased extension without the dot.
pub(crate) fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

pub(crate) fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    extension_lower(path).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// First free path in `dir` for `file_name`, appending `_1`, `_2`, ... before the extension.
pub(crate) fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    let extension = name
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    (1u32..)
        .map(|index| dir.join(format!("{stem}_{index}{extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Move a file or directory, falling back to copy-and-delete across devices.
pub(crate) fn move_path(source: &Path, destination: &Path) -> OpsResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| OpsError::io("move.create_parent", parent, err))?;
    }
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            copy_then_remove(source, destination)
        }
        Err(err) => Err(OpsError::io("move.rename", source, err)),
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> OpsResult<()> {
    if source.is_dir() {
        for entry in WalkDir::new(source) {
            let entry = entry.map_err(|err| OpsError::walkdir("move.copy_walk", source, err))?;
            let relative = entry.path().strip_prefix(source).map_err(|_| OpsError::InvalidInput {
                field: "source_path",
                reason: "strip_prefix",
                value: Some(entry.path().display().to_string()),
            })?;
            let target = destination.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|err| OpsError::io("move.copy_dir", &target, err))?;
            } else {
                fs::copy(entry.path(), &target)
                    .map_err(|err| OpsError::io("move.copy_entry", &target, err))?;
            }
        }
        fs::remove_dir_all(source).map_err(|err| OpsError::io("move.remove_dir", source, err))
    } else {
        fs::copy(source, destination)
            .map_err(|err| OpsError::io("move.copy_file", destination, err))?;
        fs::remove_file(source).map_err(|err| OpsError::io("move.remove_file", source, err))
    }
}

pub(crate) fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned())
}
