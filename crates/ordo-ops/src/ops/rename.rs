//! Bulk renames: extension repair and filename normalisation.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{OpsError, OpsResult};
use crate::fsutil::{file_name_string, require_dir, unique_destination, walk_files};
use crate::log::{OperationLog, action};
use crate::model::{Invocation, Manifest, Operation};

/// Mangled suffixes and the extension that replaces them.
const SUFFIX_REPAIRS: [(&str, &str); 4] = [
    (".@@@", ".mp4"),
    (".mpeg@@@", ".mpeg"),
    (".mpeg@", ".mpeg"),
    (".@@@mkv", ".mkv"),
];

fn repaired_name(name: &str) -> Option<String> {
    if !name.contains('.') {
        return Some(format!("{name}.zip"));
    }
    SUFFIX_REPAIRS.iter().find_map(|(suffix, replacement)| {
        name.strip_suffix(suffix)
            .map(|base| format!("{base}{replacement}"))
    })
}

/// Repairs broken or missing extensions on every file below the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameFiles;

impl Operation for RenameFiles {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;

        let (mut renamed, mut failed, mut processed) = (0_u64, 0_u64, 0_u64);
        for file in walk_files(target, |_| false)? {
            let name = file_name_string(&file);
            let Some(new_name) = repaired_name(&name) else {
                continue;
            };
            processed += 1;
            let parent = file.parent().unwrap_or(target);
            let destination = unique_destination(parent, new_name.as_ref());
            if !invocation.dry_run {
                if let Err(err) = fs::rename(&file, &destination) {
                    log.line(format!("Error renaming file {}: {err}", file.display()))?;
                    failed += 1;
                    continue;
                }
            }
            log.line(format!(
                "{}: {} -> {}",
                action(invocation.dry_run, "Renamed", "[Dry Run] Would rename"),
                file.display(),
                destination.display()
            ))?;
            renamed += 1;
        }

        log.line(format!("Total files processed: {processed}"))?;
        log.finish()?;
        Ok(Manifest::counts(renamed, failed))
    }
}

/// Compiled patterns used by [`SmartRename`].
struct Cleaner {
    counters: Regex,
    whitespace: Regex,
    disallowed: Regex,
}

impl Cleaner {
    fn new() -> OpsResult<Self> {
        Ok(Self {
            counters: OpsError::pattern(r"\(\d+\)")?,
            whitespace: OpsError::pattern(r"\s+")?,
            disallowed: OpsError::pattern(r"[^a-zA-Z0-9_]")?,
        })
    }

    /// Cleaned form of `name`, or `None` when nothing usable remains.
    fn clean(&self, name: &str) -> Option<String> {
        let without_counters = self.counters.replace_all(name, "");
        let (base, extension) = split_extension(without_counters.trim());
        let underscored = self.whitespace.replace_all(base.trim(), "_");
        let cleaned = self.disallowed.replace_all(&underscored, "");
        if cleaned.is_empty() {
            None
        } else {
            Some(format!("{cleaned}{extension}"))
        }
    }
}

/// Split at the last dot, keeping the dot with the extension; a leading dot is part of the base.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 && !name[..index].chars().all(|c| c == '.') => name.split_at(index),
        _ => (name, ""),
    }
}

/// Normalises filenames below the target to `[A-Za-z0-9_]` stems.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartRename;

impl SmartRename {
    fn claim(claimed: &mut BTreeSet<PathBuf>, dir: &Path, name: &str) -> PathBuf {
        let candidate = dir.join(name);
        let path = if claimed.contains(&candidate) || candidate.exists() {
            let (base, extension) = split_extension(name);
            (1_u32..)
                .map(|index| dir.join(format!("{base}_{index}{extension}")))
                .find(|path| !claimed.contains(path) && !path.exists())
                .unwrap_or(candidate)
        } else {
            candidate
        };
        claimed.insert(path.clone());
        path
    }
}

impl Operation for SmartRename {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let cleaner = Cleaner::new()?;
        let mut log = OperationLog::open(invocation.log_path)?;

        let files = walk_files(target, |_| false)?;
        if files.is_empty() {
            log.line("No files found in the specified folder")?;
            log.finish()?;
            return Ok(Manifest::counts(0, 0));
        }
        let mut claimed: BTreeSet<PathBuf> = files.iter().cloned().collect();

        let (mut renamed, mut skipped) = (0_u64, 0_u64);
        for file in &files {
            let name = file_name_string(file);
            let Some(cleaned) = cleaner.clean(&name) else {
                log.line(format!("[Skipped] Nothing left after cleaning: {name}"))?;
                skipped += 1;
                continue;
            };
            if cleaned == name {
                log.line(format!("[Skipped] No change needed: {name}"))?;
                skipped += 1;
                continue;
            }
            let parent = file.parent().unwrap_or(target);
            let destination = Self::claim(&mut claimed, parent, &cleaned);
            if !invocation.dry_run {
                if let Err(err) = fs::rename(file, &destination) {
                    log.line(format!("Error renaming {}: {err}", file.display()))?;
                    skipped += 1;
                    continue;
                }
            }
            log.line(format!(
                "{}: {name} -> {}",
                action(invocation.dry_run, "Renamed", "[Dry Run] Would rename"),
                file_name_string(&destination)
            ))?;
            renamed += 1;
        }

        log.line(format!("Total files processed: {}", files.len()))?;
        log.finish()?;
        Ok(Manifest::counts(renamed, skipped))
    }
}
