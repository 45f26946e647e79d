//! Contract between the engine and operation implementations.
//!
//! # Design
//! - [`Operation::run`] is blocking and synchronous; callers decide where it runs.
//! - Counts are optional so an implementation that reports nothing is still representable.
//! - Auxiliary request fields arrive as a flat string map and are read through typed helpers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OpsResult;

/// Names of the auxiliary request fields consumed by specific operations.
pub mod params {
    /// Date applied by `modify_image_dates`.
    pub const TARGET_DATE: &str = "target_date";
    /// Destination mode for `sort_move_files` (`1`, `2` or `3`).
    pub const DESTINATION_MODE: &str = "destination_mode";
    /// Destination used when the mode is `3`.
    pub const CUSTOM_DEST_PATH: &str = "custom_dest_path";
    /// Playlist to download.
    pub const PLAYLIST_URL: &str = "playlist_url";
    /// Maximum playlist resolution label (e.g. `720p`).
    pub const PLAYLIST_RESOLUTION: &str = "playlist_resolution";
    /// Newline-separated pages to scrape.
    pub const SCRAPER_URLS: &str = "scraper_urls";
    /// `yes` enables lazy-load attribute discovery while scraping.
    pub const SCRAPER_DYNAMIC: &str = "scraper_dynamic";
}

/// Auxiliary request fields keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationParams(BTreeMap<String, String>);

impl OperationParams {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Trimmed value of `name`, treating blank values as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Truthy interpretation of `name` (`yes`, `true`, `1`, `on`).
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "yes" | "true" | "1" | "on"
            )
        })
    }
}

impl<K, V> FromIterator<(K, V)> for OperationParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Everything an operation receives for one run.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Validated filesystem target (directory, file or output root).
    pub target: &'a Path,
    /// Report without mutating the filesystem.
    pub dry_run: bool,
    /// File the run log must be written to.
    pub log_path: &'a Path,
    /// Auxiliary request fields.
    pub params: &'a OperationParams,
    /// Root for backup snapshots.
    pub backup_dir: &'a Path,
}

/// Structured result handed back to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Items moved, renamed, processed or downloaded.
    pub acted_on: Option<u64>,
    /// Items skipped or failed.
    pub skipped: Option<u64>,
    /// Soft failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Output files produced by the run, in production order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generated_files: Vec<PathBuf>,
    /// Root of a tree-shaped output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Manifest {
    /// Manifest with known counts.
    #[must_use]
    pub const fn counts(acted_on: u64, skipped: u64) -> Self {
        Self {
            acted_on: Some(acted_on),
            skipped: Some(skipped),
            error: None,
            generated_files: Vec::new(),
            output_dir: None,
        }
    }

    /// Manifest of an implementation that reported nothing.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Soft failure with zeroed counts.
    #[must_use]
    pub fn soft_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::counts(0, 0)
        }
    }

    /// Attach generated files.
    #[must_use]
    pub fn with_generated_files(mut self, files: Vec<PathBuf>) -> Self {
        self.generated_files = files;
        self
    }

    /// Attach a tree-shaped output root.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Whether the manifest reports a soft failure.
    #[must_use]
    pub const fn is_soft_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// A single invocable file or URL task.
pub trait Operation: Send + Sync {
    /// Run the operation to completion.
    ///
    /// # Errors
    ///
    /// Returns an error when the operation cannot proceed at all; recoverable
    /// conditions are reported through [`Manifest::error`] instead.
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest>;
}

impl<F> Operation for F
where
    F: Fn(&Invocation<'_>) -> OpsResult<Manifest> + Send + Sync,
{
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        self(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_treat_blank_values_as_absent() {
        let params = OperationParams::new()
            .with(params::TARGET_DATE, "   ")
            .with(params::PLAYLIST_URL, " https://example.com/list ")
            .with(params::SCRAPER_DYNAMIC, "Yes");
        assert_eq!(params.get(params::TARGET_DATE), None);
        assert_eq!(
            params.get(params::PLAYLIST_URL),
            Some("https://example.com/list")
        );
        assert!(params.flag(params::SCRAPER_DYNAMIC));
        assert!(!params.flag(params::DESTINATION_MODE));
    }

    #[test]
    fn manifest_constructors() {
        let soft = Manifest::soft_error("yt-dlp missing");
        assert!(soft.is_soft_failure());
        assert_eq!(soft.acted_on, Some(0));
        assert_eq!(Manifest::unknown().acted_on, None);
        let files = Manifest::counts(2, 0).with_generated_files(vec![PathBuf::from("/a_OCR.txt")]);
        assert_eq!(files.generated_files.len(), 1);
    }
}
