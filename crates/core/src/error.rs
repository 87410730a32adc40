//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("invalid repository name: {0}")]
    InvalidName(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
