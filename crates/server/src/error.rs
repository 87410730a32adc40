//! API error types and the OCI error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use berth_storage::StoreError;
use serde::Serialize;

/// The fixed OCI Distribution error code set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    BlobUnknown,
    BlobUploadInvalid,
    BlobUploadUnknown,
    DigestInvalid,
    ManifestBlobUnknown,
    ManifestInvalid,
    ManifestUnknown,
    NameInvalid,
    NameUnknown,
    SizeInvalid,
    Unauthorized,
    Denied,
    Unsupported,
    TooManyRequests,
}

impl ErrorCode {
    /// The symbolic code string used in the error envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlobUnknown => "BLOB_UNKNOWN",
            Self::BlobUploadInvalid => "BLOB_UPLOAD_INVALID",
            Self::BlobUploadUnknown => "BLOB_UPLOAD_UNKNOWN",
            Self::DigestInvalid => "DIGEST_INVALID",
            Self::ManifestBlobUnknown => "MANIFEST_BLOB_UNKNOWN",
            Self::ManifestInvalid => "MANIFEST_INVALID",
            Self::ManifestUnknown => "MANIFEST_UNKNOWN",
            Self::NameInvalid => "NAME_INVALID",
            Self::NameUnknown => "NAME_UNKNOWN",
            Self::SizeInvalid => "SIZE_INVALID",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Denied => "DENIED",
            Self::Unsupported => "UNSUPPORTED",
            Self::TooManyRequests => "TOOMANYREQUESTS",
        }
    }

    /// The canonical human-readable message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::BlobUnknown => "blob unknown to registry",
            Self::BlobUploadInvalid => "blob upload invalid",
            Self::BlobUploadUnknown => "blob upload unknown to registry",
            Self::DigestInvalid => "provided digest did not match uploaded content",
            Self::ManifestBlobUnknown => {
                "manifest references a manifest or blob unknown to registry"
            }
            Self::ManifestInvalid => "manifest invalid",
            Self::ManifestUnknown => "manifest unknown to registry",
            Self::NameInvalid => "invalid repository name",
            Self::NameUnknown => "repository name not known to registry",
            Self::SizeInvalid => "provided length did not match content length",
            Self::Unauthorized => "authentication required",
            Self::Denied => "requested access to the resource is denied",
            Self::Unsupported => "the operation is unsupported",
            Self::TooManyRequests => "too many requests",
        }
    }

    /// The HTTP status this code maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BlobUnknown => StatusCode::NOT_FOUND,
            Self::BlobUploadInvalid => StatusCode::BAD_REQUEST,
            Self::BlobUploadUnknown => StatusCode::NOT_FOUND,
            Self::DigestInvalid => StatusCode::BAD_REQUEST,
            Self::ManifestBlobUnknown => StatusCode::NOT_FOUND,
            Self::ManifestInvalid => StatusCode::BAD_REQUEST,
            Self::ManifestUnknown => StatusCode::NOT_FOUND,
            Self::NameInvalid => StatusCode::BAD_REQUEST,
            Self::NameUnknown => StatusCode::NOT_FOUND,
            Self::SizeInvalid => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Denied => StatusCode::FORBIDDEN,
            Self::Unsupported => StatusCode::METHOD_NOT_ALLOWED,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// One entry in the OCI error envelope.
#[derive(Debug, Serialize)]
pub struct OciError {
    pub code: &'static str,
    pub message: &'static str,
    pub details: String,
}

/// The OCI error envelope: `{"errors": [...]}`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub errors: Vec<OciError>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}: {details}", .code.as_str())]
    Registry { code: ErrorCode, details: String },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Build a registry error with a code and contextual details.
    pub fn registry(code: ErrorCode, details: impl Into<String>) -> Self {
        Self::Registry {
            code,
            details: details.into(),
        }
    }

    /// The OCI code for this error, if it maps to one. Internal and I/O
    /// failures have no code: they are reported as plain 500s.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Registry { code, .. } => Some(*code),
            Self::Store(e) => match e {
                StoreError::BlobNotFound(_) => Some(ErrorCode::BlobUnknown),
                StoreError::UploadNotFound(_) => Some(ErrorCode::BlobUploadUnknown),
                StoreError::ManifestNotFound { .. } => Some(ErrorCode::ManifestUnknown),
                StoreError::DigestMismatch { .. } => Some(ErrorCode::DigestInvalid),
                StoreError::InvalidPath(_) => Some(ErrorCode::NameInvalid),
                StoreError::Io(_) => None,
            },
            Self::Internal(_) => None,
        }
    }

    /// The HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code()
            .map(|code| code.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<berth_core::Error> for ApiError {
    fn from(e: berth_core::Error) -> Self {
        let code = match &e {
            berth_core::Error::InvalidDigest(_) => ErrorCode::DigestInvalid,
            berth_core::Error::InvalidName(_) => ErrorCode::NameInvalid,
            berth_core::Error::InvalidReference(_) => ErrorCode::NameInvalid,
            berth_core::Error::InvalidManifest(_) => ErrorCode::ManifestInvalid,
        };
        Self::Registry {
            code,
            details: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.code() {
            Some(code) => {
                let details = match self {
                    Self::Registry { details, .. } => details,
                    other => other.to_string(),
                };
                let body = ErrorEnvelope {
                    errors: vec![OciError {
                        code: code.as_str(),
                        message: code.message(),
                        details,
                    }],
                };
                (code.status(), Json(body)).into_response()
            }
            None => {
                // I/O and internal failures: plain body, logged server-side.
                let message = self.to_string();
                tracing::error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn store_errors_map_to_codes() {
        let err = ApiError::from(StoreError::BlobNotFound("abc".to_string()));
        assert_eq!(err.code(), Some(ErrorCode::BlobUnknown));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::from(StoreError::UploadNotFound(Uuid::new_v4()));
        assert_eq!(err.code(), Some(ErrorCode::BlobUploadUnknown));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::from(StoreError::DigestMismatch {
            expected: "a".repeat(64),
            actual: "b".repeat(64),
        });
        assert_eq!(err.code(), Some(ErrorCode::DigestInvalid));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn io_errors_have_no_code() {
        let err = ApiError::from(StoreError::Io(std::io::Error::other("disk on fire")));
        assert_eq!(err.code(), None);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn core_errors_map_to_codes() {
        let err = ApiError::from(berth_core::Error::InvalidDigest("short".to_string()));
        assert_eq!(err.code(), Some(ErrorCode::DigestInvalid));

        let err = ApiError::from(berth_core::Error::InvalidName("..".to_string()));
        assert_eq!(err.code(), Some(ErrorCode::NameInvalid));

        let err = ApiError::from(berth_core::Error::InvalidManifest("bad json".to_string()));
        assert_eq!(err.code(), Some(ErrorCode::ManifestInvalid));
    }

    #[test]
    fn code_table_is_consistent() {
        let codes = [
            ErrorCode::BlobUnknown,
            ErrorCode::BlobUploadInvalid,
            ErrorCode::BlobUploadUnknown,
            ErrorCode::DigestInvalid,
            ErrorCode::ManifestBlobUnknown,
            ErrorCode::ManifestInvalid,
            ErrorCode::ManifestUnknown,
            ErrorCode::NameInvalid,
            ErrorCode::NameUnknown,
            ErrorCode::SizeInvalid,
            ErrorCode::Unauthorized,
            ErrorCode::Denied,
            ErrorCode::Unsupported,
            ErrorCode::TooManyRequests,
        ];
        for code in codes {
            assert!(!code.as_str().is_empty());
            assert!(!code.message().is_empty());
            assert!(code.status().is_client_error() || code.status().is_server_error());
        }
    }
}
