//! Text extraction from images with `tesseract`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OpsError, OpsResult};
use crate::fsutil::{has_extension, walk_files};
use crate::log::OperationLog;
use crate::model::{Invocation, Manifest, Operation};
use crate::tool::{ExternalTool, ResolvedTool};

const OCR_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

/// Sibling output path: `photo.png` becomes `photo_OCR.txt`.
fn output_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    image.with_file_name(format!("{stem}_OCR.txt"))
}

fn images_under(target: &Path) -> OpsResult<Vec<PathBuf>> {
    let candidates = if target.is_file() {
        vec![target.to_path_buf()]
    } else if target.is_dir() {
        walk_files(target, |_| false)?
    } else {
        return Err(OpsError::InvalidInput {
            field: "target",
            reason: "not_a_file_or_directory",
            value: Some(target.display().to_string()),
        });
    };
    Ok(candidates
        .into_iter()
        .filter(|path| has_extension(path, &OCR_EXTENSIONS))
        .collect())
}

/// Runs OCR on a single image or every image below a directory.
///
/// A missing `tesseract` binary fails the whole run rather than producing a
/// soft failure, since no image could be processed without it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractText;

impl ExtractText {
    fn recognise(tesseract: &ResolvedTool, image: &Path) -> Result<String, String> {
        let output = tesseract
            .output([image.as_os_str(), OsStr::new("stdout")])
            .map_err(|err| err.detail())?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Operation for ExtractText {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let target = invocation.target;
        let mut log = OperationLog::open(invocation.log_path)?;
        log.line(format!("Starting OCR task on: {}", target.display()))?;
        log.line(format!("Dry Run: {}", invocation.dry_run))?;

        let tesseract = match ExternalTool::TESSERACT.require() {
            Ok(tool) => tool,
            Err(err) => {
                log.line(ExternalTool::TESSERACT.missing_message())?;
                log.finish()?;
                return Err(err);
            }
        };

        let images = images_under(target)?;
        if images.is_empty() {
            log.line("No valid images found to process.")?;
            log.finish()?;
            return Ok(Manifest::counts(0, 0));
        }

        if invocation.dry_run {
            log.line(format!("[Dry Run] Would process {} images:", images.len()))?;
            for image in &images {
                log.line(format!("  - {}", image.display()))?;
            }
            log.finish()?;
            return Ok(Manifest::counts(images.len() as u64, 0));
        }

        let mut generated = Vec::new();
        let mut failed = 0_u64;
        for image in &images {
            log.line(format!("Processing image: {}", image.display()))?;
            let text = match Self::recognise(&tesseract, image) {
                Ok(text) => text,
                Err(reason) => {
                    log.line(format!("Failed to process {}: {reason}", image.display()))?;
                    failed += 1;
                    continue;
                }
            };
            if text.trim().is_empty() {
                log.line(format!("No text found in {}", image.display()))?;
                failed += 1;
                continue;
            }
            let output = output_path(image);
            if let Err(err) = fs::write(&output, text) {
                log.line(format!("Failed to save {}: {err}", output.display()))?;
                failed += 1;
                continue;
            }
            log.line(format!("Saved text to: {}", output.display()))?;
            generated.push(output);
        }

        log.line(format!("Processed: {}, Failed: {failed}", generated.len()))?;
        log.finish()?;
        Ok(Manifest::counts(generated.len() as u64, failed).with_generated_files(generated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn output_sits_beside_the_image() {
        assert_eq!(
            output_path(Path::new("/scans/page 1.png")),
            PathBuf::from("/scans/page 1_OCR.txt")
        );
    }

    #[test]
    fn single_file_targets_are_accepted() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("receipt.JPG");
        fs::write(&image, b"img")?;
        fs::write(dir.path().join("notes.txt"), b"txt")?;
        assert_eq!(images_under(&image)?, vec![image.clone()]);
        assert_eq!(images_under(dir.path())?, vec![image]);
        assert!(images_under(&dir.path().join("missing")).is_err());
        Ok(())
    }
}
