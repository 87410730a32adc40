//! Core domain types and shared logic for the berth container registry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content digests and SHA-256 hashing
//! - Repository name and reference validation
//! - Image manifest schema and validation
//! - Configuration types

pub mod config;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod repository;

pub use config::{AppConfig, ServerConfig, StorageConfig};
pub use digest::{DIGEST_PREFIX, Digest, DigestHasher, is_bare_digest};
pub use error::{Error, Result};
pub use manifest::{
    Descriptor, ImageManifest, MANIFEST_V2_MEDIA_TYPE, OCTET_STREAM_MEDIA_TYPE,
};
pub use repository::{validate_name, validate_reference};
