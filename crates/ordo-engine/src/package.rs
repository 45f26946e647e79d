//! Stages generated output as a single downloadable artifact.
//!
//! # Design
//! - One generated file is copied as-is; several files or a whole output tree
//!   become one zip archive.
//! - Source files are only read, never moved or deleted.
//! - Failures are logged and surface as "no download link".

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use ordo_ops::Manifest;
use ordo_telemetry::Metrics;
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{EngineError, EngineResult};

/// Writes artifacts into the transient directory.
#[derive(Clone)]
pub struct Packager {
    temp_dir: PathBuf,
    metrics: Metrics,
}

impl Packager {
    /// Packager staging into `temp_dir`.
    #[must_use]
    pub const fn new(temp_dir: PathBuf, metrics: Metrics) -> Self {
        Self { temp_dir, metrics }
    }

    /// Directory artifacts are staged in.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Package the output described by `manifest`, returning the artifact basename.
    #[must_use]
    pub fn package(&self, label: &str, manifest: &Manifest) -> Option<String> {
        match self.try_package(label, manifest) {
            Ok(Some((name, kind))) => {
                info!(label, artifact = %name, kind, "artifact packaged");
                self.metrics.inc_artifact_packaged(kind);
                Some(name)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(label, error = %err, "packaging failed; no download offered");
                None
            }
        }
    }

    fn try_package(
        &self,
        label: &str,
        manifest: &Manifest,
    ) -> EngineResult<Option<(String, &'static str)>> {
        let files: Vec<&PathBuf> = manifest
            .generated_files
            .iter()
            .filter(|path| path.is_file())
            .collect();
        match files.as_slice() {
            [] => {}
            [single] => return self.copy_single(single).map(|name| Some((name, "file"))),
            many => {
                let entries = flat_entries(many);
                return self.write_archive(label, &entries).map(|name| Some((name, "zip")));
            }
        }

        let Some(root) = manifest.output_dir.as_deref().filter(|dir| dir.is_dir()) else {
            return Ok(None);
        };
        let entries = tree_entries(root)?;
        if entries.is_empty() {
            return Ok(None);
        }
        self.write_archive(label, &entries)
            .map(|name| Some((name, "zip")))
    }

    fn copy_single(&self, source: &Path) -> EngineResult<String> {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                EngineError::io(
                    "package.file_name",
                    source,
                    io::Error::new(io::ErrorKind::InvalidInput, "generated file has no name"),
                )
            })?;
        let (destination, mut output) = self.reserve(|attempt| suffixed(&name, attempt))?;
        let copied = File::open(source)
            .map_err(|err| EngineError::io("package.open_source", source, err))
            .and_then(|mut input| {
                io::copy(&mut input, &mut output)
                    .map_err(|err| EngineError::io("package.copy", &destination, err))
            });
        if let Err(err) = copied {
            drop(output);
            fs::remove_file(&destination).ok();
            return Err(err);
        }
        Ok(basename(&destination))
    }

    fn write_archive(&self, label: &str, entries: &[(String, PathBuf)]) -> EngineResult<String> {
        let stamp = Utc::now().timestamp();
        let (path, file) = self.reserve(|attempt| {
            if attempt == 0 {
                format!("{label}_{stamp}.zip")
            } else {
                format!("{label}_{stamp}_{attempt}.zip")
            }
        })?;
        if let Err(err) = write_zip(&path, file, entries) {
            fs::remove_file(&path).ok();
            return Err(err);
        }
        Ok(basename(&path))
    }

    /// Create the first free name produced by `name_for(0)`, `name_for(1)`, ...
    fn reserve(&self, name_for: impl Fn(u32) -> String) -> EngineResult<(PathBuf, File)> {
        let mut attempt = 0_u32;
        loop {
            let path = self.temp_dir.join(name_for(attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(EngineError::io("package.reserve", path, err)),
            }
        }
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned())
}

/// `name` itself for attempt 0, then `{stem}_{n}.{ext}`.
fn suffixed(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{attempt}.{ext}"),
        _ => format!("{name}_{attempt}"),
    }
}

fn write_zip(path: &Path, file: File, entries: &[(String, PathBuf)]) -> EngineResult<()> {
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, source) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|err| EngineError::zip("package.start_entry", path, err))?;
        let mut input =
            File::open(source).map_err(|err| EngineError::io("package.open_source", source, err))?;
        io::copy(&mut input, &mut zip)
            .map_err(|err| EngineError::io("package.write_entry", path, err))?;
    }
    zip.finish()
        .map_err(|err| EngineError::zip("package.finish", path, err))?;
    Ok(())
}

/// Basenames for an explicit file list, suffixed `_{n}` on repeats.
fn flat_entries(files: &[&PathBuf]) -> Vec<(String, PathBuf)> {
    let mut used = HashSet::new();
    files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
            let mut candidate = name.clone();
            let mut counter = 1_u32;
            while !used.insert(candidate.clone()) {
                candidate = suffixed(&name, counter);
                counter += 1;
            }
            (candidate, (*path).clone())
        })
        .collect()
}

/// Every regular file below `root` keyed by its `/`-separated relative path.
fn tree_entries(root: &Path) -> EngineResult<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| EngineError::Walkdir {
            operation: "package.walk",
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        entries.push((name, entry.into_path()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    type TestResult<T> = anyhow::Result<T>;

    fn entry_names(archive: &Path) -> TestResult<Vec<String>> {
        let mut zip = ZipArchive::new(File::open(archive)?)?;
        let mut names = Vec::new();
        for index in 0..zip.len() {
            names.push(zip.by_index(index)?.name().to_string());
        }
        names.sort();
        Ok(names)
    }

    fn packager(temp: &Path) -> TestResult<Packager> {
        Ok(Packager::new(temp.to_path_buf(), Metrics::new()?))
    }

    #[test]
    fn single_file_is_copied_under_its_basename() -> TestResult<()> {
        let source = tempfile::tempdir()?;
        let temp = tempfile::tempdir()?;
        let file = source.path().join("receipt_OCR.txt");
        fs::write(&file, b"total 42")?;
        let manifest = Manifest::counts(1, 0).with_generated_files(vec![file.clone()]);

        let link = packager(temp.path())?.package("OCR_Results", &manifest);
        assert_eq!(link.as_deref(), Some("receipt_OCR.txt"));
        assert_eq!(fs::read(temp.path().join("receipt_OCR.txt"))?, b"total 42");
        assert!(file.exists());
        Ok(())
    }

    #[test]
    fn single_files_with_the_same_name_get_distinct_links() -> TestResult<()> {
        let source = tempfile::tempdir()?;
        let temp = tempfile::tempdir()?;
        let packager = packager(temp.path())?;
        let mut links = Vec::new();
        for (dir, body) in [("first", "from first"), ("second", "from second")] {
            fs::create_dir_all(source.path().join(dir))?;
            let file = source.path().join(dir).join("receipt_OCR.txt");
            fs::write(&file, body)?;
            let manifest = Manifest::counts(1, 0).with_generated_files(vec![file]);
            links.push(packager.package("OCR_Results", &manifest));
        }

        assert_eq!(links[0].as_deref(), Some("receipt_OCR.txt"));
        assert_eq!(links[1].as_deref(), Some("receipt_OCR_1.txt"));
        assert_eq!(fs::read(temp.path().join("receipt_OCR.txt"))?, b"from first");
        assert_eq!(fs::read(temp.path().join("receipt_OCR_1.txt"))?, b"from second");
        Ok(())
    }

    #[test]
    fn several_files_become_a_flat_zip() -> TestResult<()> {
        let source = tempfile::tempdir()?;
        let temp = tempfile::tempdir()?;
        let mut files = Vec::new();
        for (dir, name) in [("a", "one_OCR.txt"), ("b", "two_OCR.txt"), ("c", "three_OCR.txt")] {
            fs::create_dir_all(source.path().join(dir))?;
            let path = source.path().join(dir).join(name);
            fs::write(&path, name)?;
            files.push(path);
        }
        let manifest = Manifest::counts(3, 0).with_generated_files(files);

        let link = packager(temp.path())?
            .package("OCR_Results", &manifest)
            .ok_or_else(|| anyhow::anyhow!("no artifact"))?;
        assert!(link.starts_with("OCR_Results_") && link.ends_with(".zip"));
        assert_eq!(
            entry_names(&temp.path().join(&link))?,
            vec!["one_OCR.txt", "three_OCR.txt", "two_OCR.txt"]
        );
        Ok(())
    }

    #[test]
    fn output_tree_keeps_relative_paths() -> TestResult<()> {
        let source = tempfile::tempdir()?;
        let temp = tempfile::tempdir()?;
        let root = source.path().join("downloaded_images");
        fs::create_dir_all(root.join("example.com/gallery"))?;
        fs::write(root.join("example.com/gallery/cat.jpg"), b"cat")?;
        fs::write(root.join("example.com/dog.png"), b"dog")?;
        let manifest = Manifest::counts(1, 0).with_output_dir(&root);

        let link = packager(temp.path())?
            .package("Scraped_Images", &manifest)
            .ok_or_else(|| anyhow::anyhow!("no artifact"))?;
        assert_eq!(
            entry_names(&temp.path().join(link))?,
            vec!["example.com/dog.png", "example.com/gallery/cat.jpg"]
        );
        Ok(())
    }

    #[test]
    fn nothing_to_package_yields_no_link() -> TestResult<()> {
        let source = tempfile::tempdir()?;
        let temp = tempfile::tempdir()?;
        let packager = packager(temp.path())?;
        assert_eq!(packager.package("OCR_Results", &Manifest::counts(0, 0)), None);

        let empty = source.path().join("downloaded_images");
        fs::create_dir_all(empty.join("example.com/root"))?;
        let manifest = Manifest::counts(1, 0).with_output_dir(&empty);
        assert_eq!(packager.package("Scraped_Images", &manifest), None);
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn packaging_errors_degrade_to_no_link() -> TestResult<()> {
        let source = tempfile::tempdir()?;
        let temp = tempfile::tempdir()?;
        let file = source.path().join("page_OCR.txt");
        fs::write(&file, b"text")?;
        let manifest = Manifest::counts(1, 0).with_generated_files(vec![file]);
        let missing = packager(&temp.path().join("gone"))?;
        assert_eq!(missing.package("OCR_Results", &manifest), None);
        Ok(())
    }

    #[test]
    fn repeated_basenames_are_suffixed() {
        let a = PathBuf::from("/x/page_OCR.txt");
        let b = PathBuf::from("/y/page_OCR.txt");
        let entries = flat_entries(&[&a, &b]);
        assert_eq!(entries[0].0, "page_OCR.txt");
        assert_eq!(entries[1].0, "page_OCR_1.txt");
    }
}
