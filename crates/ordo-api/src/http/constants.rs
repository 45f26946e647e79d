//! Shared HTTP constants (headers, problem URIs, content types).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://ordo.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://ordo.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://ordo.dev/problems/not-found";

pub(crate) const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub(crate) const CONTENT_TYPE_ZIP: &str = "application/zip";
pub(crate) const CONTENT_TYPE_BINARY: &str = "application/octet-stream";
pub(crate) const CONTENT_TYPE_PROMETHEUS: &str = "text/plain; version=0.0.4";
