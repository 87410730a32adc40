//! Storage error types.

use thiserror::Error;
use uuid::Uuid;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("upload session not found: {0}")]
    UploadNotFound(Uuid),

    #[error("manifest not found: {repo}/{reference}")]
    ManifestNotFound { repo: String, reference: String },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
