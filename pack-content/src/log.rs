//! Registration audit log.
//!
//! Every successful `register` appends one [`Registration`], whether or not
//! the bytes were already stored. The log is provenance only; retrieval never
//! consults it.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use pack_types::ContentHash;

use crate::error::ContentError;

/// One registration of a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Content address the upload resolved to.
    pub content_hash: ContentHash,
    /// Caller-supplied logical id.
    pub external_id: String,
    /// Effective client IP of the uploader.
    pub source_ip: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Unix timestamp (seconds) of the registration.
    pub stored_at: i64,
    /// `true` when the artifact already existed and nothing was written.
    pub deduplicated: bool,
}

/// Aggregate counts over the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total registrations recorded.
    pub registrations: u64,
    /// Distinct content hashes registered.
    pub distinct_packs: u64,
}

/// Append-only registration log.
#[async_trait]
pub trait RegistrationLog: Send + Sync {
    /// Append a registration.
    async fn record(&self, registration: &Registration) -> Result<(), ContentError>;

    /// All registrations for a hash, oldest first.
    async fn history(&self, hash: &ContentHash) -> Result<Vec<Registration>, ContentError>;

    /// Most recent registration made under an external id.
    async fn latest_for_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Registration>, ContentError>;

    /// Aggregate counts.
    async fn stats(&self) -> Result<StoreStats, ContentError>;
}

/// In-memory log for testing.
#[derive(Debug, Default)]
pub struct MemoryLog {
    rows: Mutex<Vec<Registration>>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded registrations.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RegistrationLog for MemoryLog {
    async fn record(&self, registration: &Registration) -> Result<(), ContentError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(registration.clone());
        Ok(())
    }

    async fn history(&self, hash: &ContentHash) -> Result<Vec<Registration>, ContentError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows
            .iter()
            .filter(|r| r.content_hash == *hash)
            .cloned()
            .collect())
    }

    async fn latest_for_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Registration>, ContentError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows
            .iter()
            .rev()
            .find(|r| r.external_id == external_id)
            .cloned())
    }

    async fn stats(&self) -> Result<StoreStats, ContentError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let distinct: std::collections::HashSet<_> = rows.iter().map(|r| r.content_hash).collect();
        Ok(StoreStats {
            registrations: rows.len() as u64,
            distinct_packs: distinct.len() as u64,
        })
    }
}
