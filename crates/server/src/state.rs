//! Application state shared across handlers.

use berth_core::AppConfig;
use berth_storage::{BlobStore, ManifestStore};
use std::sync::Arc;

/// Shared application state.
///
/// Stores are injected explicitly so the whole service can run against
/// temporary directories in tests; nothing here is process-global.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob store (content-addressed blobs + upload sessions).
    pub blobs: Arc<BlobStore>,
    /// Manifest store (dual-addressed manifests + tag index).
    pub manifests: Arc<ManifestStore>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: AppConfig, blobs: Arc<BlobStore>, manifests: Arc<ManifestStore>) -> Self {
        Self {
            config: Arc::new(config),
            blobs,
            manifests,
        }
    }
}
