//! Main PackServer coordination.
//!
//! PackServer holds the immutable configuration and the components every
//! request goes through: identity resolution, agent gatekeeping, and the
//! content store.

use crate::config::Config;
use crate::error::Result;
use crate::gatekeeper::{AgentGatekeeper, Verdict};
use crate::identity::IdentityResolver;
use crate::storage::SqliteRegistry;
use pack_content::{ContentStore, FsStore};
use pack_types::PolicyClass;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Operational metrics for monitoring server activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Successful uploads.
    pub uploads_total: AtomicU64,
    /// Successful downloads.
    pub downloads_total: AtomicU64,
    /// Uploads whose bytes were already stored.
    pub dedup_hits: AtomicU64,
    /// Pack bytes received.
    pub bytes_received: AtomicU64,
    /// Pack bytes served.
    pub bytes_sent: AtomicU64,
    /// Unknown agents let through.
    pub agent_warnings: AtomicU64,
    /// Unknown agents refused.
    pub agent_rejections: AtomicU64,
    /// Downloads of unknown hashes.
    pub not_found_total: AtomicU64,
    /// Downloads abandoned on fetch timeout.
    pub timeouts_total: AtomicU64,
    /// Failed requests (identity, storage, malformed input).
    pub errors_total: AtomicU64,
}

impl ServerMetrics {
    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Main pack server.
pub struct PackServer {
    config: Config,
    identity: IdentityResolver,
    gatekeeper: AgentGatekeeper,
    store: ContentStore,
    metrics: ServerMetrics,
}

impl std::fmt::Debug for PackServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackServer")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl PackServer {
    /// Create a PackServer, compiling the identity and agent policies.
    ///
    /// # Errors
    ///
    /// Fails on an invalid proxy header name or agent pattern.
    pub fn new(config: Config, store: ContentStore) -> Result<Self> {
        let identity = IdentityResolver::new(&config.proxy)?;
        let gatekeeper = AgentGatekeeper::new(&config.security)?;
        Ok(Self {
            config,
            identity,
            gatekeeper,
            store,
            metrics: ServerMetrics::default(),
        })
    }

    /// Open the registry and pack directory named by `config` and build the
    /// server on top of them.
    ///
    /// The pack store is returned as well so the caller can sweep it.
    pub async fn open(config: Config) -> Result<(Self, Arc<FsStore>)> {
        let registry = SqliteRegistry::new(&config.storage.database).await?;
        let blobs = Arc::new(FsStore::open(&config.storage.packs_dir).await?);
        let store = ContentStore::new(
            blobs.clone(),
            Arc::new(registry),
            config.storage.fetch_timeout(),
        );
        Ok((Self::new(config, store)?, blobs))
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the identity resolver.
    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// Get the agent gatekeeper.
    pub fn gatekeeper(&self) -> &AgentGatekeeper {
        &self.gatekeeper
    }

    /// Get the content store.
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Get the operational metrics.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// Evaluate an agent, logging and counting anything but a clean allow.
    pub fn gatekeep(&self, agent: &str, class: PolicyClass, ip: IpAddr) -> Verdict {
        let verdict = self.gatekeeper.evaluate(agent, class);
        match verdict {
            Verdict::Allow => {}
            Verdict::Warn => {
                ServerMetrics::incr(&self.metrics.agent_warnings);
                tracing::warn!(%ip, agent, %class, "Unknown application access");
            }
            Verdict::Reject => {
                ServerMetrics::incr(&self.metrics.agent_rejections);
                tracing::warn!(%ip, agent, %class, "Rejecting unknown application");
            }
        }
        verdict
    }
}
