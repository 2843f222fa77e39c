//! Filesystem blob store.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   .staging/<uuid>.part        in-flight writes
//!   <first 2 hex chars>/
//!     <remaining 38 hex chars>.zip
//! ```
//!
//! Writes land in `.staging`, are fsynced, then renamed into place. Rename is
//! atomic within one filesystem, so readers see either no artifact or the
//! complete one.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use pack_types::ContentHash;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::ContentError;
use crate::store::{BlobHandle, BlobStore};

const STAGING_DIR: &str = ".staging";
const STAGING_EXT: &str = "part";

/// Blob store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    staging: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ContentError> {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| ContentError::from_io(e, &staging))?;
        Ok(Self { root, staging })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of the artifact for `hash`.
    pub fn artifact_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root
            .join(hash.shard_prefix())
            .join(format!("{}.zip", &hex[2..]))
    }

    /// Delete staged files older than `max_age`.
    ///
    /// Staged files are only left behind when the process died mid-write; none
    /// of them is reachable under a content hash.
    pub async fn sweep_staging(&self, max_age: Duration) -> Result<u64, ContentError> {
        let mut entries = fs::read_dir(&self.staging)
            .await
            .map_err(|e| ContentError::from_io(e, &self.staging))?;
        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ContentError::from_io(e, &self.staging))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STAGING_EXT) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!("Skipping staged file {:?}: {}", path, e);
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                // Another sweep got there first.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(ContentError::from_io(e, &path)),
            }
        }

        Ok(removed)
    }

    fn staging_path(&self) -> PathBuf {
        self.staging
            .join(format!("{}.{}", uuid::Uuid::new_v4(), STAGING_EXT))
    }

    async fn write_staged(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn exists(path: &Path) -> Result<bool, ContentError> {
        fs::try_exists(path)
            .await
            .map_err(|e| ContentError::from_io(e, path))
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn put_if_absent(&self, hash: &ContentHash, bytes: &[u8]) -> Result<bool, ContentError> {
        let target = self.artifact_path(hash);
        if Self::exists(&target).await? {
            return Ok(false);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ContentError::from_io(e, parent))?;
        }

        let staged = self.staging_path();
        if let Err(e) = Self::write_staged(&staged, bytes).await {
            let _ = fs::remove_file(&staged).await;
            return Err(ContentError::from_io(e, &staged));
        }

        // A writer in another process may have committed meanwhile.
        if Self::exists(&target).await? {
            let _ = fs::remove_file(&staged).await;
            return Ok(false);
        }

        if let Err(e) = fs::rename(&staged, &target).await {
            let _ = fs::remove_file(&staged).await;
            return Err(ContentError::from_io(e, &target));
        }

        tracing::debug!("Committed artifact {} ({} bytes)", hash, bytes.len());
        Ok(true)
    }

    async fn open(&self, hash: &ContentHash) -> Result<Option<BlobHandle>, ContentError> {
        let path = self.artifact_path(hash);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(BlobHandle::File {
                path,
                size: meta.len(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContentError::from_io(e, &path)),
        }
    }

    async fn contains(&self, hash: &ContentHash) -> bool {
        Self::exists(&self.artifact_path(hash)).await.unwrap_or(false)
    }
}
