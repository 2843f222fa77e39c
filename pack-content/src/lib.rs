//! # pack-content
//!
//! Content-addressed, deduplicated pack storage for packhost.
//!
//! A pack is registered under a caller-supplied external id and stored under
//! the SHA-1 of its bytes. The hash is the only retrieval key.
//!
//! ## Register
//!
//! ```text
//! bytes ──► SHA-1 ──► per-hash lock ──► BlobStore::put_if_absent ──► RegistrationLog::record
//!                                         (write-once artifact)        (always, for audit)
//! ```
//!
//! 1. Hash the complete payload
//! 2. Serialise writers of the same hash (different hashes never contend)
//! 3. Write the artifact only if it is absent
//! 4. Append a registration row, deduplicated or not
//! 5. Return the hash
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use packhost_content::{ContentStore, Fetched, MemoryLog, MemoryStore};
//!
//! let store = ContentStore::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryLog::new()),
//!     Duration::from_secs(10),
//! );
//! let hash = store.register(b"PK...", "ServerA", "127.0.0.1".parse()?).await?;
//! assert!(matches!(store.fetch(&hash).await?, Fetched::Found(_)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod fs;
mod log;
mod store;

pub use error::ContentError;
pub use fs::FsStore;
pub use log::{MemoryLog, Registration, RegistrationLog, StoreStats};
pub use store::{BlobHandle, BlobStore, MemoryStore};

use dashmap::DashMap;
use pack_types::ContentHash;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Outcome of a lookup by content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The artifact exists.
    Found(BlobHandle),
    /// No artifact is stored under the hash.
    NotFound,
    /// The backing medium did not answer within the fetch timeout.
    TimedOut,
}

/// Content-addressed pack store.
///
/// Binds a [`BlobStore`] (the artifacts) to a [`RegistrationLog`] (who
/// uploaded what, from where).
pub struct ContentStore {
    blobs: Arc<dyn BlobStore>,
    log: Arc<dyn RegistrationLog>,
    fetch_timeout: Duration,
    write_locks: DashMap<ContentHash, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("fetch_timeout", &self.fetch_timeout)
            .field("pending_writes", &self.write_locks.len())
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    /// Create a content store.
    ///
    /// # Arguments
    ///
    /// * `blobs` - Artifact storage
    /// * `log` - Registration audit log
    /// * `fetch_timeout` - Upper bound on a single `fetch`
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        log: Arc<dyn RegistrationLog>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            blobs,
            log,
            fetch_timeout,
            write_locks: DashMap::new(),
        }
    }

    /// Register a pack and return its content hash.
    ///
    /// `bytes` must be the complete payload. Re-registering identical bytes
    /// writes nothing and returns the same hash.
    ///
    /// # Errors
    ///
    /// - `StorageFull` / `Io` if the artifact could not be written
    /// - `Log` if the registration could not be recorded
    pub async fn register(
        &self,
        bytes: &[u8],
        external_id: &str,
        source_ip: IpAddr,
    ) -> Result<ContentHash, ContentError> {
        self.register_detailed(bytes, external_id, source_ip)
            .await
            .map(|r| r.content_hash)
    }

    /// Register a pack and return the full registration record.
    pub async fn register_detailed(
        &self,
        bytes: &[u8],
        external_id: &str,
        source_ip: IpAddr,
    ) -> Result<Registration, ContentError> {
        let hash = ContentHash::of(bytes);
        let written = self.write_once(&hash, bytes).await?;

        if !written {
            tracing::debug!("Dedup hit for {} (external id {:?})", hash, external_id);
        }

        let registration = Registration {
            content_hash: hash,
            external_id: external_id.to_string(),
            source_ip: source_ip.to_string(),
            size: bytes.len() as u64,
            stored_at: current_timestamp(),
            deduplicated: !written,
        };
        self.log.record(&registration).await?;

        Ok(registration)
    }

    /// Resolve a content hash to a readable artifact.
    ///
    /// Never waits longer than the configured fetch timeout.
    pub async fn fetch(&self, hash: &ContentHash) -> Result<Fetched, ContentError> {
        match tokio::time::timeout(self.fetch_timeout, self.blobs.open(hash)).await {
            Ok(Ok(Some(handle))) => Ok(Fetched::Found(handle)),
            Ok(Ok(None)) => Ok(Fetched::NotFound),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Fetched::TimedOut),
        }
    }

    /// Registrations recorded for a hash, oldest first.
    pub async fn history(&self, hash: &ContentHash) -> Result<Vec<Registration>, ContentError> {
        self.log.history(hash).await
    }

    /// Most recent registration under an external id.
    pub async fn latest_for_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Registration>, ContentError> {
        self.log.latest_for_external_id(external_id).await
    }

    /// Aggregate registration counts.
    pub async fn stats(&self) -> Result<StoreStats, ContentError> {
        self.log.stats().await
    }

    /// Configured fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Write the artifact under the per-hash lock. Returns whether it was written.
    async fn write_once(&self, hash: &ContentHash, bytes: &[u8]) -> Result<bool, ContentError> {
        // Already stored: no need to queue behind other writers.
        if self.blobs.contains(hash).await {
            return Ok(false);
        }

        let entry = WriteLockEntry::acquire(&self.write_locks, *hash);
        let _guard = entry.lock().lock().await;
        self.blobs.put_if_absent(hash, bytes).await
    }
}

/// A share of one hash's write lock.
///
/// Dropping the last share removes the entry from the table, including when
/// the owning `register` future is cancelled mid-write.
struct WriteLockEntry<'a> {
    locks: &'a DashMap<ContentHash, Arc<Mutex<()>>>,
    hash: ContentHash,
    lock: Arc<Mutex<()>>,
}

impl<'a> WriteLockEntry<'a> {
    fn acquire(locks: &'a DashMap<ContentHash, Arc<Mutex<()>>>, hash: ContentHash) -> Self {
        let lock = locks.entry(hash).or_default().clone();
        Self { locks, hash, lock }
    }

    fn lock(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for WriteLockEntry<'_> {
    fn drop(&mut self) {
        // Release this share before checking, or two guards dropping together
        // could each count the other and both keep the entry.
        drop(std::mem::take(&mut self.lock));
        // Shares are only cloned under the shard lock `remove_if` holds.
        self.locks
            .remove_if(&self.hash, |_, l| Arc::strong_count(l) == 1);
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
