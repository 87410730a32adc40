//! Root-confined path resolution.

use crate::error::{StoreError, StoreResult};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Resolve a relative key under a root, rejecting anything that would
/// escape it.
///
/// Keys here come from repository names and references, which the HTTP
/// layer has already validated; this re-checks at the storage boundary so
/// the stores are safe to use directly.
pub fn resolve_under(root: &Path, key: &str) -> StoreResult<PathBuf> {
    if key.is_empty() {
        return Err(StoreError::InvalidPath("empty key".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
        return Err(StoreError::InvalidPath(format!(
            "path traversal not allowed: {key}"
        )));
    }
    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(StoreError::InvalidPath(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }
    }
    Ok(root.join(key))
}

/// Create a directory (and parents) with mode 0755.
pub async fn ensure_dir(path: &Path) -> StoreResult<()> {
    fs::create_dir_all(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}
