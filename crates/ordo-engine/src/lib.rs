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

//! Operation dispatch and execution engine.
//!
//! A request names a target and a list of operation ids. The [`Engine`]
//! validates the target against the [`OperationRegistry`], runs each operation
//! through the [`Executor`] in request order, packages generated output with the
//! [`Packager`] and returns one [`ExecutionResult`] per distinct id. The
//! [`Janitor`] deletes stale packaged artifacts in the background.
//!
//! Layout: `registry.rs`, `validate.rs`, `executor.rs`, `aggregate.rs`,
//! `package.rs`, `janitor.rs`, `model.rs` (request/result types), `error.rs`.

pub mod aggregate;
pub mod error;
pub mod executor;
pub mod janitor;
pub mod model;
pub mod package;
pub mod registry;
pub mod validate;

pub use aggregate::Engine;
pub use error::{EngineError, EngineResult};
pub use executor::{Execution, Executor};
pub use janitor::{Janitor, SweepReport};
pub use model::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, Rejection, RunSummary, Severity,
    UserMessage, ValidatedTarget,
};
pub use package::Packager;
pub use registry::{InputKind, OperationDescriptor, OperationRegistry, RegistryBuilder, RequiredParam};
pub use validate::validate;
