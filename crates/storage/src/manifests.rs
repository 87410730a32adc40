//! Manifest store with dual addressing and the in-memory tag index.

use crate::error::{StoreError, StoreResult};
use crate::paths::{ensure_dir, resolve_under};
use berth_core::{DIGEST_PREFIX, Digest, is_bare_digest};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Manifest store rooted at a local directory.
///
/// Each manifest is stored twice under its repository directory: once
/// under the reference it was pushed with and once under its bare digest,
/// so both `(repo, tag)` and `(repo, digest)` resolve to the same bytes.
/// When the reference is itself the digest the two writes coincide.
///
/// The tag index is populated by a full scan at construction and kept
/// current by every put and delete; writers update the filesystem and the
/// index inside the same critical section, so a listing after a put
/// observes the new tag.
pub struct ManifestStore {
    root: PathBuf,
    tags: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl ManifestStore {
    /// Open a manifest store, creating the root if missing and scanning
    /// it to seed the tag index.
    pub async fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        ensure_dir(&root).await?;
        let tags = scan_tags(&root).await;
        debug!(repos = tags.len(), "tag index loaded");
        Ok(Self {
            root,
            tags: Mutex::new(tags),
        })
    }

    /// Normalize a reference to the file name it is stored under.
    fn file_name(reference: &str) -> &str {
        reference.strip_prefix(DIGEST_PREFIX).unwrap_or(reference)
    }

    fn manifest_path(&self, repo: &str, name: &str) -> StoreResult<PathBuf> {
        resolve_under(&self.root, &format!("{repo}/{name}"))
    }

    /// Store a manifest under `reference` and under its own digest.
    ///
    /// The digest is computed from `data` exactly as received; callers
    /// must pass the raw request body so the digest matches what clients
    /// compute. Returns the manifest digest.
    pub async fn put(&self, repo: &str, reference: &str, data: &[u8]) -> StoreResult<Digest> {
        let name = Self::file_name(reference);
        let path = self.manifest_path(repo, name)?;
        let digest = Digest::compute(data);

        let mut tags = self.tags.lock().await;
        if let Some(parent) = path.parent() {
            ensure_dir(parent).await?;
        }
        fs::write(&path, data).await?;

        let bare = digest.to_hex();
        if name != bare {
            let digest_path = self.manifest_path(repo, &bare)?;
            fs::write(&digest_path, data).await?;
        }

        if !is_bare_digest(name) {
            tags.entry(repo.to_string())
                .or_default()
                .insert(name.to_string());
        }

        info!(repo, reference, digest = %digest, "manifest stored");
        Ok(digest)
    }

    /// Read a manifest by tag or digest, returning its bytes and digest.
    pub async fn get(&self, repo: &str, reference: &str) -> StoreResult<(Bytes, Digest)> {
        let name = Self::file_name(reference);
        let path = self.manifest_path(repo, name)?;

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ManifestNotFound {
                    repo: repo.to_string(),
                    reference: reference.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;

        let digest = Digest::compute(&data);
        Ok((Bytes::from(data), digest))
    }

    /// Delete a manifest by tag or digest.
    ///
    /// Deleting a tag leaves the digest-addressed copy in place; deleting
    /// by digest removes only that copy.
    pub async fn delete(&self, repo: &str, reference: &str) -> StoreResult<()> {
        let name = Self::file_name(reference);
        let path = self.manifest_path(repo, name)?;

        let mut tags = self.tags.lock().await;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ManifestNotFound {
                    repo: repo.to_string(),
                    reference: reference.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;

        if !is_bare_digest(name)
            && let Some(set) = tags.get_mut(repo)
        {
            set.remove(name);
        }

        info!(repo, reference, "manifest deleted");
        Ok(())
    }

    /// Whether the repository has any stored manifests.
    pub async fn repo_exists(&self, repo: &str) -> StoreResult<bool> {
        let path = resolve_under(&self.root, repo)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Sorted tags for one repository. Unknown repositories yield an
    /// empty list.
    pub async fn tags(&self, repo: &str) -> Vec<String> {
        let tags = self.tags.lock().await;
        tags.get(repo)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All repositories with their sorted tags.
    pub async fn all_tags(&self) -> BTreeMap<String, Vec<String>> {
        let tags = self.tags.lock().await;
        tags.iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(repo, set)| (repo.clone(), set.iter().cloned().collect()))
            .collect()
    }
}

/// Walk the manifest tree and collect tag names per repository.
///
/// Digest-named files (64 hex chars) are digest-addressed copies, not
/// tags. Unreadable entries are skipped: a broken corner of the tree
/// degrades the listing, it does not fail startup.
async fn scan_tags(root: &Path) -> HashMap<String, BTreeSet<String>> {
    let mut tags: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory in tag scan");
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "tag scan aborted for directory");
                    break;
                }
            };
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_bare_digest(&name) {
                    continue;
                }
                let Some(repo) = entry
                    .path()
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().into_owned())
                else {
                    continue;
                };
                // Files directly under the root belong to no repository.
                if repo.is_empty() {
                    continue;
                }
                tags.entry(repo).or_default().insert(name);
            }
            // Symlinks are ignored, same as the blob side.
        }
    }

    tags
}
