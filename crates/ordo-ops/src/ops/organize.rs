//! Folder organisation: by year, by size bucket and by extension.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local};

use crate::error::{OpsError, OpsResult};
use crate::fsutil::{
    file_name_string, move_path, require_dir, top_level_dirs, top_level_files, unique_destination,
    walk_files,
};
use crate::log::{OperationLog, action};
use crate::model::{Invocation, Manifest, Operation, params};

const YEAR_PATTERN: &str = r"\b(19|20)\d{2}\b";

/// Moves top-level files into `<target>/<year>` folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegregateByYear;

impl Operation for SegregateByYear {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let pattern = OpsError::pattern(YEAR_PATTERN)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line(format!("Starting segregation by year in: {}", target.display()))?;
        log.line(format!("Dry Run: {}", invocation.dry_run))?;

        let (mut moved, mut skipped) = (0_u64, 0_u64);
        for file in top_level_files(target)? {
            let name = file_name_string(&file);
            let modified_year = match modified_year(&file) {
                Ok(year) => year,
                Err(err) => {
                    log.line(format!("[Skipped] {}", err.detail()))?;
                    skipped += 1;
                    continue;
                }
            };
            let name_year = pattern
                .find(&name)
                .and_then(|found| found.as_str().parse::<i32>().ok());
            if let Some(name_year) = name_year.filter(|year| *year != modified_year) {
                log.line(format!(
                    "Name year {name_year} of {name} disagrees with modification year {modified_year}"
                ))?;
            }

            let year = modified_year.to_string();
            if parent_name(&file).as_deref() == Some(year.as_str()) {
                log.line(format!("Skipped (already in {year}): {name}"))?;
                skipped += 1;
                continue;
            }
            let year_dir = target.join(&year);
            if !invocation.dry_run {
                let destination = unique_destination(&year_dir, file_name(&file));
                if let Err(err) = move_path(&file, &destination) {
                    log.line(format!("Error moving {name}: {}", err.detail()))?;
                    skipped += 1;
                    continue;
                }
            }
            log.line(format!(
                "{}: {name} -> {}",
                action(invocation.dry_run, "Moved", "[Dry Run] Would move"),
                year_dir.display()
            ))?;
            moved += 1;
        }

        log.line(format!("Completed. Moved: {moved}, Skipped: {skipped}"))?;
        log.finish()?;
        Ok(Manifest::counts(moved, skipped))
    }
}

fn modified_year(path: &Path) -> OpsResult<i32> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|source| OpsError::io("segregate_by_year.mtime", path, source))?;
    Ok(DateTime::<Local>::from(modified).year())
}

fn parent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

const SIZE_BUCKETS: [(u64, &str); 7] = [
    (10, "FOLDER_10"),
    (30, "FOLDER_30"),
    (60, "FOLDER_60"),
    (90, "FOLDER_90"),
    (120, "FOLDER_120"),
    (150, "FOLDER_150"),
    (240, "FOLDER_240"),
];

const MEBIBYTE: u64 = 1024 * 1024;

/// Bucket folder name for a file of `bytes` bytes.
fn size_bucket(bytes: u64) -> String {
    // Whole-MiB comparison matches `mb < limit` for the fractional size.
    let whole_mb = bytes / MEBIBYTE;
    SIZE_BUCKETS
        .iter()
        .find(|(limit, _)| whole_mb < *limit)
        .map_or_else(
            || format!("folder_{}", (whole_mb / 30) * 30 + 30),
            |(_, name)| (*name).to_string(),
        )
}

/// Moves every file below the target into a size bucket folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegregateBySize;

impl Operation for SegregateBySize {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line(format!("Starting segregation by size in: {}", target.display()))?;

        let (mut moved, mut skipped) = (0_u64, 0_u64);
        for file in walk_files(target, |_| false)? {
            let bytes = match fs::metadata(&file) {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    log.line(format!("[Skipped] Size error for {}: {err}", file.display()))?;
                    skipped += 1;
                    continue;
                }
            };
            let bucket_dir = target.join(size_bucket(bytes));
            if file.parent() == Some(bucket_dir.as_path()) {
                log.line(format!("[Skipped] Already in correct folder: {}", file.display()))?;
                skipped += 1;
                continue;
            }
            if !invocation.dry_run {
                let destination = unique_destination(&bucket_dir, file_name(&file));
                if let Err(err) = move_path(&file, &destination) {
                    log.line(format!("Error moving {}: {}", file.display(), err.detail()))?;
                    skipped += 1;
                    continue;
                }
            }
            log.line(format!(
                "{}: {} -> {}",
                action(invocation.dry_run, "Moved", "[Dry Run] Would move"),
                file.display(),
                bucket_dir.display()
            ))?;
            moved += 1;
        }

        log.line(format!("Total files moved: {moved}"))?;
        log.line(format!("Total files skipped: {skipped}"))?;
        log.finish()?;
        Ok(Manifest::counts(moved, skipped))
    }
}

fn file_name(path: &Path) -> &OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}

const FOLDER_OF_FOLDERS: &str = "FoF";
const NO_EXTENSION: &str = "no_extension";

/// Sorts top-level files into per-extension folders and collects folders under `FoF`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortMoveFiles;

impl SortMoveFiles {
    fn destination(invocation: &Invocation<'_>, log: &mut OperationLog) -> OpsResult<Result<PathBuf, String>> {
        let target = invocation.target;
        let mode = invocation
            .params
            .get(params::DESTINATION_MODE)
            .unwrap_or("2");
        match mode {
            "1" => {
                let stamp = Local::now().format("%d_%b_%y");
                let dest = target.join(format!("Downloads_bkp_{stamp}"));
                if !dest.exists() {
                    if !invocation.dry_run {
                        fs::create_dir(&dest)
                            .map_err(|source| OpsError::io("sort_move.create_dest", &dest, source))?;
                    }
                    log.line(format!("Created backup folder: {}", dest.display()))?;
                }
                Ok(Ok(dest))
            }
            "2" => {
                log.line(format!("Organizing in same folder: {}", target.display()))?;
                Ok(Ok(target.to_path_buf()))
            }
            "3" => match invocation.params.get(params::CUSTOM_DEST_PATH) {
                None => Ok(Err("destination path is required for mode 3".to_string())),
                Some(custom) if !Path::new(custom).is_dir() => {
                    Ok(Err(format!("destination folder does not exist: {custom}")))
                }
                Some(custom) => {
                    log.line(format!("Using custom destination: {custom}"))?;
                    Ok(Ok(PathBuf::from(custom)))
                }
            },
            other => Ok(Err(format!("unknown destination mode: {other}"))),
        }
    }
}

fn extension_folder(path: &Path) -> String {
    path.extension()
        .map_or_else(|| NO_EXTENSION.to_string(), |ext| ext.to_string_lossy().into_owned())
}

impl Operation for SortMoveFiles {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        let dest = match Self::destination(invocation, &mut log)? {
            Ok(dest) => dest,
            Err(message) => return log.soft_failure(message),
        };

        let files = top_level_files(target)?;
        let folders = top_level_dirs(target)?;
        let extension_folders: BTreeSet<String> = files.iter().map(|file| extension_folder(file)).collect();

        let (mut moved, mut skipped) = (0_u64, 0_u64);
        for file in files {
            let ext_dir = dest.join(extension_folder(&file));
            if file.parent() == Some(ext_dir.as_path()) {
                log.line(format!("[Skipped] Already in correct folder: {}", file.display()))?;
                skipped += 1;
                continue;
            }
            let destination = unique_destination(&ext_dir, file_name(&file));
            if !invocation.dry_run {
                if let Err(err) = move_path(&file, &destination) {
                    log.line(format!("Error moving {}: {}", file.display(), err.detail()))?;
                    skipped += 1;
                    continue;
                }
            }
            log.line(format!(
                "{}: {} -> {}",
                action(invocation.dry_run, "Moved", "[Dry Run] Would move"),
                file.display(),
                destination.display()
            ))?;
            moved += 1;
        }

        let fof = dest.join(FOLDER_OF_FOLDERS);
        for folder in folders {
            let name = file_name_string(&folder);
            if folder == dest
                || name == FOLDER_OF_FOLDERS
                || name == NO_EXTENSION
                || extension_folders.contains(&name)
            {
                log.line(format!("[Skipped] System folder: {}", folder.display()))?;
                skipped += 1;
                continue;
            }
            let destination = unique_destination(&fof, file_name(&folder));
            if !invocation.dry_run {
                if let Err(err) = move_path(&folder, &destination) {
                    log.line(format!("Error moving folder {}: {}", folder.display(), err.detail()))?;
                    skipped += 1;
                    continue;
                }
            }
            log.line(format!(
                "{} folder: {} -> {}",
                action(invocation.dry_run, "Moved", "[Dry Run] Would move"),
                folder.display(),
                destination.display()
            ))?;
            moved += 1;
        }

        log.line(format!("Total files moved: {moved}"))?;
        log.line(format!("Total files skipped: {skipped}"))?;
        log.line(format!("Files moved from {} to {}", target.display(), dest.display()))?;
        log.finish()?;
        Ok(Manifest::counts(moved, skipped))
    }
}
