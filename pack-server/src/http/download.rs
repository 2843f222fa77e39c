//! Pack download endpoint.

use super::error::ApiError;
use super::user_agent;
use crate::gatekeeper::Verdict;
use crate::server::{PackServer, ServerMetrics};
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use pack_content::{BlobHandle, ContentError, Fetched};
use pack_types::{ContentHash, PolicyClass};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

const NOT_FOUND_BODY: &str = "Pack not found";

/// Query string of `GET /pack.zip`.
#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// Hex content hash.
    pub id: Option<String>,
}

/// Download handler.
pub async fn download_handler(
    Extension(server): Extension<Arc<PackServer>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Response {
    match download(&server, peer, &headers, params).await {
        Ok(response) => response,
        Err(e) => {
            e.log("download");
            if !e.is_refusal() {
                ServerMetrics::incr(&server.metrics().errors_total);
            }
            e.into_response_for(server.config().http.legacy_status_codes)
        }
    }
}

async fn download(
    server: &PackServer,
    peer: SocketAddr,
    headers: &HeaderMap,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let ip = server.identity().resolve(headers, peer)?;

    if server.gatekeep(user_agent(headers), PolicyClass::Download, ip) == Verdict::Reject {
        return Err(ApiError::UnknownApplication);
    }

    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = params
        .id
        .ok_or_else(|| ApiError::BadRequest("missing parameter: id".to_string()))?;

    // A malformed hash cannot name a stored pack.
    let Ok(hash) = ContentHash::from_hex(id.trim()) else {
        tracing::debug!(%ip, id = %id, "Malformed pack id");
        return Ok(not_found(server));
    };

    let fetch_timeout = server.store().fetch_timeout();
    match server.store().fetch(&hash).await.map_err(ApiError::Fetch)? {
        Fetched::Found(handle) => {
            let size = handle.size();
            let body = match tokio::time::timeout(fetch_timeout, body_of(handle)).await {
                Ok(Ok(body)) => body,
                // Found a moment ago; the file is gone now.
                Ok(Err(ContentError::Io { source, .. }))
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    return Ok(not_found(server));
                }
                Ok(Err(e)) => return Err(ApiError::Fetch(e)),
                Err(_) => return Ok(timed_out(server, ip, &hash)),
            };

            let metrics = server.metrics();
            ServerMetrics::incr(&metrics.downloads_total);
            ServerMetrics::add(&metrics.bytes_sent, size);
            tracing::debug!(%ip, %hash, size, "Serving pack");

            Ok((
                StatusCode::OK,
                [
                    (CONTENT_TYPE, "application/zip".to_string()),
                    (CONTENT_LENGTH, size.to_string()),
                ],
                body,
            )
                .into_response())
        }
        Fetched::NotFound => {
            tracing::debug!(%ip, %hash, "Pack not found");
            Ok(not_found(server))
        }
        Fetched::TimedOut => Ok(timed_out(server, ip, &hash)),
    }
}

fn timed_out(server: &PackServer, ip: IpAddr, hash: &ContentHash) -> Response {
    ServerMetrics::incr(&server.metrics().timeouts_total);
    tracing::warn!(
        %ip,
        %hash,
        timeout_ms = server.store().fetch_timeout().as_millis() as u64,
        "Pack fetch timed out"
    );
    StatusCode::GATEWAY_TIMEOUT.into_response()
}

async fn body_of(handle: BlobHandle) -> Result<Body, ContentError> {
    match handle {
        BlobHandle::File { path, .. } => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| ContentError::from_io(e, &path))?;
            Ok(Body::from_stream(ReaderStream::new(file)))
        }
        BlobHandle::Memory(bytes) => Ok(Body::from(bytes)),
    }
}

fn not_found(server: &PackServer) -> Response {
    ServerMetrics::incr(&server.metrics().not_found_total);
    let status = if server.config().http.legacy_status_codes {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, NOT_FOUND_BODY).into_response()
}
