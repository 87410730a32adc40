//! Content-addressed blob store and resumable upload sessions.

use crate::error::{StoreError, StoreResult};
use crate::paths::ensure_dir;
use berth_core::Digest;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Directory under the blob root holding in-flight upload files.
const UPLOADS_DIR: &str = "uploads";

/// A boxed stream of bytes for streaming blob I/O.
pub type ByteStream =
    std::pin::Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// An in-flight upload: the append handle and the temp file it writes to.
struct UploadFile {
    file: fs::File,
    path: PathBuf,
}

/// Content-addressed blob store rooted at a local directory.
///
/// Committed blobs live flat under the root, named by their bare digest.
/// In-flight uploads live under `uploads/<session-id>` until a finalize
/// verifies the digest and renames them into place; the rename stays on
/// one filesystem, so a blob is either fully present or absent.
///
/// The session table serializes all upload mutations behind one mutex.
/// The lock covers the file handle as well as the map, so appends to a
/// session produce contiguous bytes and a finalize cannot race an append.
pub struct BlobStore {
    root: PathBuf,
    sessions: Mutex<HashMap<Uuid, UploadFile>>,
}

impl BlobStore {
    /// Open a blob store, creating the root and uploads directories if
    /// missing.
    pub async fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        ensure_dir(&root.join(UPLOADS_DIR)).await?;
        Ok(Self {
            root,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.to_hex())
    }

    fn upload_path(&self, id: Uuid) -> PathBuf {
        self.root.join(UPLOADS_DIR).join(id.to_string())
    }

    /// Start a new upload session and return its id.
    pub async fn start_upload(&self) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        let path = self.upload_path(id);
        let file = fs::File::create(&path).await?;

        let mut sessions = self.sessions.lock().await;
        sessions.insert(id, UploadFile { file, path });
        debug!(session_id = %id, "upload session started");
        Ok(id)
    }

    /// Append a chunk to an upload session.
    ///
    /// Returns the inclusive offset of the last byte written so far, per
    /// the `Range: 0-<end>` response header. An empty chunk is legal: the
    /// result is clamped so a zero-byte append at offset 0 reports 0
    /// rather than underflowing.
    pub async fn append_chunk(&self, id: Uuid, mut body: ByteStream) -> StoreResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or(StoreError::UploadNotFound(id))?;

        let offset = entry.file.metadata().await?.len();
        let mut copied: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            entry.file.write_all(&chunk).await?;
            copied += chunk.len() as u64;
        }
        entry.file.flush().await?;

        debug!(session_id = %id, offset, copied, "chunk appended");
        Ok((offset + copied).saturating_sub(1))
    }

    /// Finalize an upload session.
    ///
    /// Removes the session, re-reads the temp file, and verifies its
    /// SHA-256 against `expected`. On match the file is renamed to its
    /// content address and the digest returned; on mismatch the temp file
    /// is deleted and no blob becomes visible. Of two concurrent
    /// finalizes for one session, only the one that removes the entry can
    /// succeed.
    pub async fn finalize_upload(&self, id: Uuid, expected: &Digest) -> StoreResult<Digest> {
        let UploadFile { file, path } = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(&id).ok_or(StoreError::UploadNotFound(id))?
        };

        // Close the append handle before re-opening for hashing.
        file.sync_all().await?;
        drop(file);

        let mut reader = fs::File::open(&path).await?;
        let mut hasher = Digest::hasher();
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        drop(reader);

        let computed = hasher.finalize();
        if &computed != expected {
            let _ = fs::remove_file(&path).await;
            warn!(
                session_id = %id,
                expected = %expected.to_hex(),
                actual = %computed.to_hex(),
                "upload digest mismatch, discarding"
            );
            return Err(StoreError::DigestMismatch {
                expected: expected.to_hex(),
                actual: computed.to_hex(),
            });
        }

        fs::rename(&path, self.blob_path(&computed)).await?;
        info!(session_id = %id, digest = %computed, "blob committed");
        Ok(computed)
    }

    /// Abort an upload session, deleting its temp file.
    pub async fn abort_upload(&self, id: Uuid) -> StoreResult<()> {
        let UploadFile { file, path } = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(&id).ok_or(StoreError::UploadNotFound(id))?
        };
        drop(file);
        let _ = fs::remove_file(&path).await;
        debug!(session_id = %id, "upload session aborted");
        Ok(())
    }

    /// Whether a committed blob exists.
    pub async fn blob_exists(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(fs::try_exists(self.blob_path(digest)).await?)
    }

    /// Get a committed blob's size without reading it.
    pub async fn stat_blob(&self, digest: &Digest) -> StoreResult<u64> {
        let metadata = fs::metadata(self.blob_path(digest)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::BlobNotFound(digest.to_hex())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(metadata.len())
    }

    /// Open a committed blob for streaming, returning the stream and its
    /// length. The underlying handle is released when the stream is
    /// dropped.
    pub async fn open_blob(&self, digest: &Digest) -> StoreResult<(ByteStream, u64)> {
        let path = self.blob_path(digest);
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::BlobNotFound(digest.to_hex())
            } else {
                StoreError::Io(e)
            }
        })?;
        let size = file.metadata().await?.len();

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok((Box::pin(stream), size))
    }
}
