//! Image timestamp rewriting and recompression.

use std::ffi::OsStr;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{OpsError, OpsResult};
use crate::fsutil::{file_name_string, has_extension, require_dir, walk_files};
use crate::log::OperationLog;
use crate::model::{Invocation, Manifest, Operation, params};
use crate::tool::ExternalTool;

const DATED_IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "webp"];
const COMPRESSIBLE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];
const COMPRESSED_DIR: &str = "Compressed_Images";
const MAX_WIDTH: u32 = 1920;
const MAX_HEIGHT: u32 = 1080;

/// Parse a `target_date` value as local time.
///
/// Accepts the browser `datetime-local` shape (`2024-03-01T09:30`), ISO
/// datetimes with or without seconds and offset, and bare ISO dates.
fn parse_target_date(raw: &str) -> Option<SystemTime> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.into());
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| raw.parse::<NaiveDateTime>())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            raw.parse::<NaiveDate>()
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(SystemTime::from)
}

fn set_file_times(path: &Path, when: SystemTime) -> OpsResult<()> {
    let file = File::options()
        .write(true)
        .open(path)
        .map_err(|source| OpsError::io("modify_image_dates.open", path, source))?;
    file.set_times(FileTimes::new().set_accessed(when).set_modified(when))
        .map_err(|source| OpsError::io("modify_image_dates.set_times", path, source))
}

/// Sets access and modification times of every image below the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifyImageDates;

impl Operation for ModifyImageDates {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line(format!("Starting image date modification in: {}", target.display()))?;

        let raw = invocation.params.get(params::TARGET_DATE).unwrap_or_default();
        let Some(when) = parse_target_date(raw) else {
            return log.soft_failure(format!("invalid date format '{raw}'"));
        };
        let shown = DateTime::<Local>::from(when).format("%Y-%m-%d %H:%M:%S");

        let images = walk_files(target, |_| false)?
            .into_iter()
            .filter(|path| has_extension(path, &DATED_IMAGE_EXTENSIONS))
            .collect::<Vec<_>>();
        if images.is_empty() {
            log.line("No images found to modify.")?;
            log.finish()?;
            return Ok(Manifest::counts(0, 0));
        }
        log.line(format!("Found {} images. Target Date: {shown}", images.len()))?;

        let (mut updated, mut failed) = (0_u64, 0_u64);
        for image in &images {
            let name = file_name_string(image);
            if invocation.dry_run {
                log.line(format!("[Dry Run] Would update: {name} -> {shown}"))?;
                updated += 1;
                continue;
            }
            match set_file_times(image, when) {
                Ok(()) => {
                    log.line(format!("Updated: {name}"))?;
                    updated += 1;
                }
                Err(err) => {
                    log.line(format!("Error updating {name}: {}", err.detail()))?;
                    failed += 1;
                }
            }
        }

        log.line(format!("Updated: {updated}, Failed: {failed}"))?;
        log.finish()?;
        Ok(Manifest::counts(updated, failed))
    }
}

/// Re-encodes images as bounded JPEGs under `Compressed_Images/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressImages;

impl CompressImages {
    fn output_path(target: &Path, output_root: &Path, image: &Path) -> PathBuf {
        let relative = image.strip_prefix(target).unwrap_or(image);
        output_root.join(relative).with_extension("jpg")
    }

    fn scale_filter() -> String {
        format!(
            "scale='min({MAX_WIDTH},iw)':'min({MAX_HEIGHT},ih)':force_original_aspect_ratio=decrease"
        )
    }
}

impl Operation for CompressImages {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        require_dir(target)?;
        let output_root = target.join(COMPRESSED_DIR);
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line(format!("Starting image compression in: {}", target.display()))?;
        log.line(format!("Output: {}", output_root.display()))?;

        let images = walk_files(target, |dir| dir == output_root.as_path())?
            .into_iter()
            .filter(|path| has_extension(path, &COMPRESSIBLE_EXTENSIONS))
            .collect::<Vec<_>>();
        if images.is_empty() {
            log.line("No images found to compress.")?;
            log.finish()?;
            return Ok(Manifest::counts(0, 0));
        }
        log.line(format!("Found {} images to compress.", images.len()))?;

        if invocation.dry_run {
            for image in &images {
                let output = Self::output_path(target, &output_root, image);
                log.line(format!(
                    "[Dry Run] Would compress: {} -> {}",
                    image.display(),
                    output.display()
                ))?;
            }
            log.finish()?;
            return Ok(Manifest::counts(images.len() as u64, 0));
        }

        let Some(ffmpeg) = ExternalTool::FFMPEG.resolve() else {
            return log.soft_failure(ExternalTool::FFMPEG.missing_message());
        };
        let filter = Self::scale_filter();
        let (mut compressed, mut failed) = (0_u64, 0_u64);
        for image in &images {
            let output = Self::output_path(target, &output_root, image);
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)
                    .map_err(|source| OpsError::io("compress_images.create_dir", parent, source))?;
            }
            let result = ffmpeg.output([
                OsStr::new("-y"),
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-i"),
                image.as_os_str(),
                OsStr::new("-vf"),
                OsStr::new(&filter),
                OsStr::new("-q:v"),
                OsStr::new("3"),
                output.as_os_str(),
            ]);
            match result {
                Ok(out) if out.status.success() => {
                    log.line(format!(
                        "Compressed: {} -> {}",
                        file_name_string(image),
                        file_name_string(&output)
                    ))?;
                    compressed += 1;
                }
                Ok(out) => {
                    log.line(format!(
                        "Error compressing {}: {}",
                        image.display(),
                        String::from_utf8_lossy(&out.stderr).trim()
                    ))?;
                    failed += 1;
                }
                Err(err) => {
                    log.line(format!("Error compressing {}: {}", image.display(), err.detail()))?;
                    failed += 1;
                }
            }
        }

        log.line(format!("Compressed: {compressed}, Failed: {failed}"))?;
        log.finish()?;
        Ok(Manifest::counts(compressed, failed))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::*;
    use crate::model::OperationParams;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn target_dates_accept_browser_and_iso_shapes() {
        for raw in [
            "2021-04-05T10:30",
            "2021-04-05T10:30:15",
            "2021-04-05 10:30:15",
            "2021-04-05",
        ] {
            let parsed = parse_target_date(raw).map(|when| DateTime::<Local>::from(when).year());
            assert_eq!(parsed, Some(2021), "{raw}");
        }
        assert!(parse_target_date("2021-04-05T10:30:00+02:00").is_some());
        assert!(parse_target_date("05/04/2021").is_none());
    }

    #[test]
    fn modify_dates_updates_images_only() -> TestResult<()> {
        let root = tempfile::tempdir()?;
        let logs = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("album"))?;
        fs::write(root.path().join("album/a.JPG"), b"jpg")?;
        fs::write(root.path().join("notes.txt"), b"txt")?;
        let params = OperationParams::new().with(params::TARGET_DATE, "2020-01-02T03:04");
        let log_path = logs.path().join("dates.txt");
        let invocation = Invocation {
            target: root.path(),
            dry_run: false,
            log_path: &log_path,
            params: &params,
            backup_dir: root.path(),
        };

        let manifest = ModifyImageDates.run(&invocation)?;
        assert_eq!(manifest, Manifest::counts(1, 0));
        let modified = fs::metadata(root.path().join("album/a.JPG"))?.modified()?;
        assert_eq!(DateTime::<Local>::from(modified).year(), 2020);
        let untouched = fs::metadata(root.path().join("notes.txt"))?.modified()?;
        assert!(DateTime::<Local>::from(untouched).year() > 2020);
        Ok(())
    }

    #[test]
    fn invalid_date_is_soft_failure() -> TestResult<()> {
        let root = tempfile::tempdir()?;
        let logs = tempfile::tempdir()?;
        let params = OperationParams::new().with(params::TARGET_DATE, "yesterday");
        let log_path = logs.path().join("dates.txt");
        let manifest = ModifyImageDates.run(&Invocation {
            target: root.path(),
            dry_run: false,
            log_path: &log_path,
            params: &params,
            backup_dir: root.path(),
        })?;
        assert!(manifest.is_soft_failure());
        Ok(())
    }

    #[test]
    fn compress_dry_run_lists_outputs_without_tool() -> TestResult<()> {
        let root = tempfile::tempdir()?;
        let logs = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("trip"))?;
        fs::write(root.path().join("trip/beach.png"), b"png")?;
        fs::create_dir_all(root.path().join(COMPRESSED_DIR))?;
        fs::write(root.path().join(COMPRESSED_DIR).join("old.jpg"), b"jpg")?;
        let params = OperationParams::new();
        let log_path = logs.path().join("compress.txt");

        let manifest = CompressImages.run(&Invocation {
            target: root.path(),
            dry_run: true,
            log_path: &log_path,
            params: &params,
            backup_dir: root.path(),
        })?;
        assert_eq!(manifest, Manifest::counts(1, 0));
        let log = fs::read_to_string(&log_path)?;
        assert!(log.contains("Compressed_Images/trip/beach.jpg"));
        assert!(!root.path().join(COMPRESSED_DIR).join("trip").exists());
        Ok(())
    }
}
