//! Built-in operation implementations, one module per family.
//!
//! Each type is a stateless unit struct implementing [`crate::Operation`].
//! Per-item failures are logged and counted as skipped; only failures that
//! prevent the whole run surface as [`crate::OpsError`].

mod git;
mod images;
mod media;
mod ocr;
mod organize;
mod playlist;
mod rename;
mod scrape;
mod video;

pub use git::BackupGitWork;
pub use images::{CompressImages, ModifyImageDates};
pub use media::OrganizeMedia;
pub use ocr::ExtractText;
pub use organize::{SegregateBySize, SegregateByYear, SortMoveFiles};
pub use playlist::DownloadPlaylist;
pub use rename::{RenameFiles, SmartRename};
pub use scrape::ScrapeImages;
pub use video::{
    CompressVideos, DetectCorruptVideos, MoveLongVideos, SegregateByHeight, SegregateByResolution,
};
