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

//! HTTP surface for the ordo engine.
//!
//! Layout: `http/router.rs` (server host and layers), `http/operations.rs`
//! (registry listing and batch runs), `http/files.rs` (log and artifact
//! downloads), `http/health.rs`, `http/telemetry.rs` (request metrics),
//! `app/state.rs` (shared handler state), `models.rs` (wire types), `error.rs`.

pub mod app;
pub mod error;
pub mod http;
pub mod models;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
