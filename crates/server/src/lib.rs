//! HTTP API server for the berth container registry.
//!
//! This crate provides the Distribution v2 HTTP surface:
//! - Resumable blob upload endpoints
//! - Blob download streaming
//! - Manifest put/get/delete with dual addressing
//! - Tag listings per repository and globally
//! - The OCI error envelope

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use state::AppState;
