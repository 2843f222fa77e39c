//! Pack upload endpoint.

use super::error::ApiError;
use super::user_agent;
use crate::gatekeeper::Verdict;
use crate::server::{PackServer, ServerMetrics};
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use pack_types::{PolicyClass, UploadResponse};
use std::net::SocketAddr;
use std::sync::Arc;

/// Upload handler.
///
/// Identity and agent checks run before the body is read, so a refused
/// client never reaches the store.
pub async fn upload_handler(
    Extension(server): Extension<Arc<PackServer>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match upload(&server, peer, &headers, multipart).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            e.log("upload");
            if !e.is_refusal() {
                ServerMetrics::incr(&server.metrics().errors_total);
            }
            e.into_response_for(server.config().http.legacy_status_codes)
        }
    }
}

async fn upload(
    server: &PackServer,
    peer: SocketAddr,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadResponse, ApiError> {
    let ip = server.identity().resolve(headers, peer)?;

    if server.gatekeep(user_agent(headers), PolicyClass::Upload, ip) == Verdict::Reject {
        return Err(ApiError::UnknownApplication);
    }

    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let form = read_form(multipart, server.config().storage.max_pack_size).await?;

    if server.gatekeeper().is_blocked_id(&form.id) {
        tracing::warn!(%ip, external_id = %form.id, "Upload under blocked id");
        return Err(ApiError::LicenseDisabled);
    }

    let registration = server
        .store()
        .register_detailed(&form.pack, &form.id, ip)
        .await?;

    let metrics = server.metrics();
    ServerMetrics::incr(&metrics.uploads_total);
    ServerMetrics::add(&metrics.bytes_received, registration.size);
    if registration.deduplicated {
        ServerMetrics::incr(&metrics.dedup_hits);
    }

    tracing::info!(
        %ip,
        external_id = %form.id,
        hash = %registration.content_hash,
        size = registration.size,
        deduplicated = registration.deduplicated,
        "Pack registered"
    );

    Ok(UploadResponse::new(
        &server.config().http.public_url,
        registration.content_hash,
    ))
}

/// Fields of an upload form.
struct UploadForm {
    pack: Bytes,
    id: String,
}

async fn read_form(mut multipart: Multipart, max_pack_size: usize) -> Result<UploadForm, ApiError> {
    let mut pack = None;
    let mut id = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("pack") => pack = Some(field.bytes().await.map_err(form_error)?),
            Some("id") => id = Some(field.text().await.map_err(form_error)?),
            _ => {}
        }
    }

    let pack = pack.ok_or_else(|| ApiError::BadRequest("missing field: pack".to_string()))?;
    // Stored exactly as sent; only a blank id counts as missing.
    let id = id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing field: id".to_string()))?;

    if pack.len() > max_pack_size {
        return Err(ApiError::TooLarge);
    }

    Ok(UploadForm { pack, id })
}

fn form_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::TooLarge
    } else {
        ApiError::BadRequest(e.body_text())
    }
}
