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

//! File and URL operations invoked by the ordo engine.
//!
//! Every operation implements [`Operation`]: it receives an [`Invocation`]
//! (target, dry-run flag, log path, auxiliary parameters), writes a line log to
//! the log path, and returns a [`Manifest`] with acted-on/skipped counts and any
//! generated output.
//!
//! Layout: `model.rs` (contract types), `log.rs` (run log writer), `fsutil.rs`
//! (shared filesystem moves), `tool.rs` (external binaries), `ops/` (one module
//! per operation family), `error.rs`.

pub mod error;
mod fsutil;
pub mod log;
pub mod model;
pub mod ops;
pub mod tool;

pub use error::{OpsError, OpsResult};
pub use log::OperationLog;
pub use model::{Invocation, Manifest, Operation, OperationParams, params};
