//! Shared handler helpers.

use axum::http::{HeaderMap, header};

/// Maximum accepted manifest body size (4 MiB).
pub const MAX_MANIFEST_SIZE: usize = 4 * 1024 * 1024;

/// Request scheme for absolute Location URLs.
///
/// TLS is terminated by an external proxy, so trust `X-Forwarded-Proto`
/// when present and fall back to plain http.
pub fn request_scheme(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http")
}

/// Request host for absolute Location URLs.
pub fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
}

/// Declared Content-Length of the request, if parseable.
pub fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
