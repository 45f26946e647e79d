//! Immutable table of invocable operations.
//!
//! # Design
//! - Built once at startup; lookups never mutate.
//! - Each descriptor carries everything the validator, executor and packager
//!   need, so adding an operation means adding one entry here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ordo_ops::Operation;
use ordo_ops::ops::{
    BackupGitWork, CompressImages, CompressVideos, DetectCorruptVideos, DownloadPlaylist,
    ExtractText, ModifyImageDates, MoveLongVideos, OrganizeMedia, RenameFiles, ScrapeImages,
    SegregateByHeight, SegregateByResolution, SegregateBySize, SegregateByYear, SmartRename,
    SortMoveFiles,
};
use ordo_ops::params;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};

/// What an operation expects of the request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// The target must already exist.
    RequiresExistingPath,
    /// The operation works from URLs; the target is only an output root.
    RequiresUrlOnly,
    /// The target is an output root that may be created on demand.
    AutoCreateOutputDir,
    /// The target may be a single file or a directory.
    FileOrDir,
}

impl InputKind {
    /// Whether this kind needs a caller-supplied source path.
    #[must_use]
    pub const fn requires_source_path(self) -> bool {
        !matches!(self, Self::RequiresUrlOnly)
    }

    /// Whether a missing target may be created as a directory.
    #[must_use]
    pub const fn may_create_target(self) -> bool {
        matches!(self, Self::RequiresUrlOnly | Self::AutoCreateOutputDir)
    }
}

/// Auxiliary parameter an operation cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequiredParam {
    /// Parameter name.
    pub name: &'static str,
    /// Failure message when the parameter is absent or blank.
    pub message: &'static str,
}

/// Static description of one operation.
#[derive(Clone)]
pub struct OperationDescriptor {
    /// Unique identifier.
    pub id: &'static str,
    /// Human label used in result messages.
    pub label: &'static str,
    /// Target requirement.
    pub input_kind: InputKind,
    /// Log file name prefix.
    pub log_prefix: &'static str,
    /// Parameters checked before invocation.
    pub required_params: &'static [RequiredParam],
    /// Archive label; set when generated output is offered for download.
    pub artifact_label: Option<&'static str>,
    operation: Arc<dyn Operation>,
}

impl OperationDescriptor {
    /// Describe `operation` under `id`.
    pub fn new(
        id: &'static str,
        label: &'static str,
        input_kind: InputKind,
        log_prefix: &'static str,
        operation: impl Operation + 'static,
    ) -> Self {
        Self {
            id,
            label,
            input_kind,
            log_prefix,
            required_params: &[],
            artifact_label: None,
            operation: Arc::new(operation),
        }
    }

    /// Parameters that must be present and non-blank.
    #[must_use]
    pub fn requires(mut self, params: &'static [RequiredParam]) -> Self {
        self.required_params = params;
        self
    }

    /// Offer generated output for download under `label`.
    #[must_use]
    pub fn packaged_as(mut self, label: &'static str) -> Self {
        self.artifact_label = Some(label);
        self
    }

    /// Implementation handle.
    #[must_use]
    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("id", &self.id)
            .field("input_kind", &self.input_kind)
            .field("log_prefix", &self.log_prefix)
            .field("artifact_label", &self.artifact_label)
            .finish_non_exhaustive()
    }
}

/// Lookup table from id to descriptor.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    descriptors: Vec<OperationDescriptor>,
    index: HashMap<&'static str, usize>,
}

/// Accumulates descriptors before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<OperationDescriptor>,
}

impl RegistryBuilder {
    /// Append a descriptor.
    #[must_use]
    pub fn register(mut self, descriptor: OperationDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Freeze the table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateOperation`] when an id is registered twice.
    pub fn build(self) -> EngineResult<OperationRegistry> {
        let mut index = HashMap::with_capacity(self.descriptors.len());
        for (position, descriptor) in self.descriptors.iter().enumerate() {
            if index.insert(descriptor.id, position).is_some() {
                return Err(EngineError::DuplicateOperation {
                    id: descriptor.id.to_string(),
                });
            }
        }
        Ok(OperationRegistry {
            descriptors: self.descriptors,
            index,
        })
    }
}

const TARGET_DATE: &[RequiredParam] = &[RequiredParam {
    name: params::TARGET_DATE,
    message: "Please select a target date.",
}];
const PLAYLIST_URL: &[RequiredParam] = &[RequiredParam {
    name: params::PLAYLIST_URL,
    message: "Please enter a playlist URL.",
}];
const SCRAPER_URLS: &[RequiredParam] = &[RequiredParam {
    name: params::SCRAPER_URLS,
    message: "No URLs provided for scraping.",
}];

impl OperationRegistry {
    /// Empty builder, mainly for tests registering fakes.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding every built-in operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in table contains a duplicate id.
    pub fn builtin() -> EngineResult<Self> {
        use InputKind::{AutoCreateOutputDir, FileOrDir, RequiresExistingPath, RequiresUrlOnly};

        Self::builder()
            .register(OperationDescriptor::new(
                "segregate_by_year",
                "Year-based segregation",
                RequiresExistingPath,
                "year_log",
                SegregateByYear,
            ))
            .register(OperationDescriptor::new(
                "sort_move_files",
                "Sort & move by extension",
                RequiresExistingPath,
                "sort_move_log",
                SortMoveFiles,
            ))
            .register(OperationDescriptor::new(
                "segregate_by_size",
                "Size-based segregation",
                RequiresExistingPath,
                "size_log",
                SegregateBySize,
            ))
            .register(OperationDescriptor::new(
                "organize_media",
                "Media organization",
                RequiresExistingPath,
                "media_organizer_log",
                OrganizeMedia,
            ))
            .register(
                OperationDescriptor::new(
                    "download_playlist",
                    "Playlist download",
                    RequiresUrlOnly,
                    "playlist_log",
                    DownloadPlaylist,
                )
                .requires(PLAYLIST_URL),
            )
            .register(OperationDescriptor::new(
                "compress_videos_in_folder",
                "Video compression",
                RequiresExistingPath,
                "compress_video_log",
                CompressVideos,
            ))
            .register(OperationDescriptor::new(
                "move_long_videos",
                "Long video segregation",
                RequiresExistingPath,
                "video_log",
                MoveLongVideos,
            ))
            .register(OperationDescriptor::new(
                "segregate_files_by_resolution",
                "Resolution-based segregation",
                RequiresExistingPath,
                "res_log",
                SegregateByResolution,
            ))
            .register(OperationDescriptor::new(
                "segregate_files_by_height",
                "Height-based segregation",
                RequiresExistingPath,
                "height_log",
                SegregateByHeight,
            ))
            .register(OperationDescriptor::new(
                "compress_images",
                "Image compression",
                RequiresExistingPath,
                "compress_images_log",
                CompressImages,
            ))
            .register(
                OperationDescriptor::new(
                    "modify_image_dates",
                    "Date modification",
                    RequiresExistingPath,
                    "date_mod_log",
                    ModifyImageDates,
                )
                .requires(TARGET_DATE),
            )
            .register(
                OperationDescriptor::new(
                    "scrape_images",
                    "Image scraping",
                    AutoCreateOutputDir,
                    "scraper_log",
                    ScrapeImages,
                )
                .requires(SCRAPER_URLS)
                .packaged_as("Scraped_Images"),
            )
            .register(
                OperationDescriptor::new(
                    "extract_text",
                    "OCR",
                    FileOrDir,
                    "ocr_log",
                    ExtractText,
                )
                .packaged_as("OCR_Results"),
            )
            .register(OperationDescriptor::new(
                "detect_and_move_corrupt_files",
                "Corrupt file detection",
                RequiresExistingPath,
                "corrupt_log",
                DetectCorruptVideos,
            ))
            .register(OperationDescriptor::new(
                "rename_files",
                "Extension-based renaming",
                RequiresExistingPath,
                "rename_ext_log",
                RenameFiles,
            ))
            .register(OperationDescriptor::new(
                "smart_rename",
                "Smart renaming",
                RequiresExistingPath,
                "smart_rename_log",
                SmartRename,
            ))
            .register(OperationDescriptor::new(
                "backup_git_work",
                "Git backup",
                RequiresExistingPath,
                "git_backup_log",
                BackupGitWork,
            ))
            .build()
    }

    /// Descriptor for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&OperationDescriptor> {
        self.index.get(id).map(|position| &self.descriptors[*position])
    }

    /// Every descriptor in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[OperationDescriptor] {
        &self.descriptors
    }

    /// Identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|descriptor| descriptor.id)
    }
}
