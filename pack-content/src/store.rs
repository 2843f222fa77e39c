//! Content-addressed blob storage.
//!
//! This module provides a trait for storing pack bytes addressed by their
//! [`ContentHash`], plus a memory-based implementation for testing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use pack_types::ContentHash;

use crate::error::ContentError;

/// Where a stored pack can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobHandle {
    /// An artifact on the local filesystem.
    File {
        /// Final, immutable location of the artifact.
        path: PathBuf,
        /// Size in bytes.
        size: u64,
    },
    /// An artifact held in memory.
    Memory(Vec<u8>),
}

impl BlobHandle {
    /// Size of the artifact in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::File { size, .. } => *size,
            Self::Memory(bytes) => bytes.len() as u64,
        }
    }

    /// Read the whole artifact.
    pub async fn read_all(&self) -> Result<Vec<u8>, ContentError> {
        match self {
            Self::File { path, .. } => tokio::fs::read(path)
                .await
                .map_err(|e| ContentError::from_io(e, path)),
            Self::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Trait for content-addressed blob storage.
///
/// Artifacts are write-once: once a hash is present its bytes never change,
/// and a reader never observes a partially written artifact.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `hash` unless an artifact already exists.
    ///
    /// Returns `true` when this call wrote the artifact, `false` when it was
    /// already present. The caller guarantees `hash == ContentHash::of(bytes)`.
    async fn put_if_absent(&self, hash: &ContentHash, bytes: &[u8]) -> Result<bool, ContentError>;

    /// Look up an artifact. `None` when the hash is unknown.
    async fn open(&self, hash: &ContentHash) -> Result<Option<BlobHandle>, ContentError>;

    /// Check if an artifact exists.
    async fn contains(&self, hash: &ContentHash) -> bool;
}

/// In-memory blob store for testing.
///
/// Not persistent - all data is lost when the store is dropped.
#[derive(Default, Clone)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<ContentHash, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct artifacts stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ContentHash, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put_if_absent(&self, hash: &ContentHash, bytes: &[u8]) -> Result<bool, ContentError> {
        let mut blobs = self.lock();
        if blobs.contains_key(hash) {
            return Ok(false);
        }
        blobs.insert(*hash, bytes.to_vec());
        Ok(true)
    }

    async fn open(&self, hash: &ContentHash) -> Result<Option<BlobHandle>, ContentError> {
        Ok(self.lock().get(hash).cloned().map(BlobHandle::Memory))
    }

    async fn contains(&self, hash: &ContentHash) -> bool {
        self.lock().contains_key(hash)
    }
}
