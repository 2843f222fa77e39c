//! Health and liveness endpoints.

use crate::server::PackServer;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Body of `GET /debug`, which existing monitors match on.
pub const LIVENESS_BODY: &str = "It seems to be working...";

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status (`ok`, or `degraded` when the registry is unreadable).
    pub status: String,
    /// Server version.
    pub version: String,
    /// Registrations recorded.
    pub registrations: u64,
    /// Distinct packs stored.
    pub packs: u64,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(server): Extension<Arc<PackServer>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let (status, stats) = match server.store().stats().await {
        Ok(stats) => ("ok", stats),
        Err(e) => {
            tracing::warn!("Health check could not read registry: {}", e);
            ("degraded", Default::default())
        }
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registrations: stats.registrations,
        packs: stats.distinct_packs,
        uptime_seconds: uptime,
    })
}

/// Ungated liveness probe.
pub async fn debug_handler() -> &'static str {
    LIVENESS_BODY
}
