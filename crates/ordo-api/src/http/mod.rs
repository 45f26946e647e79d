//! HTTP surface modules (router, handlers, middleware).

/// Shared constants and header names.
pub mod constants;
/// Problem response helpers.
pub mod errors;
/// Log and artifact downloads.
pub mod files;
/// Health and metrics endpoints.
pub mod health;
/// Registry listing and batch execution.
pub mod operations;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
