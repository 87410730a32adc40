//! Server test utilities.

use berth_core::{AppConfig, StorageConfig};
use berth_server::{AppState, create_router};
use berth_storage::{BlobStore, ManifestStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies on temporary storage.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage roots.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let blob_root = temp_dir.path().join("blobs");
        let manifest_root = temp_dir.path().join("manifests");

        let blobs = Arc::new(
            BlobStore::new(&blob_root)
                .await
                .expect("Failed to create blob store"),
        );
        let manifests = Arc::new(
            ManifestStore::new(&manifest_root)
                .await
                .expect("Failed to create manifest store"),
        );

        let config = AppConfig {
            storage: StorageConfig {
                blob_root,
                manifest_root,
            },
            ..Default::default()
        };

        let state = AppState::new(config, blobs, manifests);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }
}
