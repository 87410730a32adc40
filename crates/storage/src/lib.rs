//! Filesystem persistence for the berth container registry.
//!
//! This crate provides:
//! - Content-addressed blob storage with atomic rename-on-commit
//! - Resumable upload sessions (in-memory, discarded on restart)
//! - Manifest storage addressed by tag and by digest, with the tag index
//! - Path sanitization confining all access to the configured roots

pub mod blobs;
pub mod error;
pub mod manifests;
pub mod paths;

pub use blobs::{BlobStore, ByteStream};
pub use error::{StoreError, StoreResult};
pub use manifests::ManifestStore;
