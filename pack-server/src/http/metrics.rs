//! Prometheus metrics endpoint.

use crate::server::PackServer;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Counters are monotonic since startup; registry gauges are read per scrape.
pub async fn metrics_handler(Extension(server): Extension<Arc<PackServer>>) -> impl IntoResponse {
    let m = server.metrics();

    let uploads = m.uploads_total.load(Ordering::Relaxed);
    let downloads = m.downloads_total.load(Ordering::Relaxed);
    let dedup = m.dedup_hits.load(Ordering::Relaxed);
    let bytes_rx = m.bytes_received.load(Ordering::Relaxed);
    let bytes_tx = m.bytes_sent.load(Ordering::Relaxed);
    let warnings = m.agent_warnings.load(Ordering::Relaxed);
    let rejections = m.agent_rejections.load(Ordering::Relaxed);
    let not_found = m.not_found_total.load(Ordering::Relaxed);
    let timeouts = m.timeouts_total.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    // Registry stats (best effort)
    let stats = server.store().stats().await.unwrap_or_default();
    let registrations = stats.registrations;
    let packs = stats.distinct_packs;

    let body = format!(
        r#"# HELP packhost_info Server information
# TYPE packhost_info gauge
packhost_info{{version="{version}"}} 1

# HELP packhost_uploads_total Successful pack uploads
# TYPE packhost_uploads_total counter
packhost_uploads_total {uploads}

# HELP packhost_downloads_total Successful pack downloads
# TYPE packhost_downloads_total counter
packhost_downloads_total {downloads}

# HELP packhost_dedup_hits_total Uploads whose bytes were already stored
# TYPE packhost_dedup_hits_total counter
packhost_dedup_hits_total {dedup}

# HELP packhost_bytes_received_total Pack bytes received
# TYPE packhost_bytes_received_total counter
packhost_bytes_received_total {bytes_rx}

# HELP packhost_bytes_sent_total Pack bytes served
# TYPE packhost_bytes_sent_total counter
packhost_bytes_sent_total {bytes_tx}

# HELP packhost_agent_warnings_total Unknown agents allowed through
# TYPE packhost_agent_warnings_total counter
packhost_agent_warnings_total {warnings}

# HELP packhost_agent_rejections_total Unknown agents refused
# TYPE packhost_agent_rejections_total counter
packhost_agent_rejections_total {rejections}

# HELP packhost_not_found_total Downloads of unknown packs
# TYPE packhost_not_found_total counter
packhost_not_found_total {not_found}

# HELP packhost_fetch_timeouts_total Downloads abandoned on fetch timeout
# TYPE packhost_fetch_timeouts_total counter
packhost_fetch_timeouts_total {timeouts}

# HELP packhost_errors_total Failed requests
# TYPE packhost_errors_total counter
packhost_errors_total {errors}

# HELP packhost_registrations Registrations recorded
# TYPE packhost_registrations gauge
packhost_registrations {registrations}

# HELP packhost_packs Distinct packs stored
# TYPE packhost_packs gauge
packhost_packs {packs}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    ([(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], body)
}
