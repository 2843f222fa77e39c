//! HTTP endpoints for pack-server.
//!
//! Provides the upload/download API plus liveness, health and metrics.

mod download;
pub mod error;
pub mod health;
mod metrics;
mod upload;

use crate::server::PackServer;
use axum::extract::DefaultBodyLimit;
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use health::HealthStatus;

/// Room for multipart boundaries and the `id` field on top of the pack.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Build the HTTP router with all endpoints.
///
/// Handlers need the peer address, so serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(server: Arc<PackServer>) -> Router {
    let body_limit = server
        .config()
        .storage
        .max_pack_size
        .saturating_add(FORM_OVERHEAD);

    let mut router = Router::new()
        .route(
            "/upload",
            post(upload::upload_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/pack.zip", get(download::download_handler))
        .route("/debug", get(health::debug_handler))
        .route("/health", get(health::health_handler));

    if server.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(Extension(server))
}

/// The request's `User-Agent`; absent or non-UTF-8 reads as empty.
fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
