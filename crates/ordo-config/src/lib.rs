#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Process-wide configuration for ordo.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (environment parsing and
//! directory preparation), `validate.rs` (field parsers), `error.rs`.

pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{AppConfig, DirectoryLayout, JanitorPolicy, ListenerConfig, LogSettings};
