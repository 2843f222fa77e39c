//! Request failures and their HTTP rendering.

use crate::identity::IdentityError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pack_content::ContentError;
use pack_types::ErrorResponse;

/// Why a gated request failed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown agent under a block+reject policy.
    #[error("Unknown Application")]
    UnknownApplication,

    /// Upload under a blocked external id.
    #[error("This license has been disabled")]
    LicenseDisabled,

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Pack exceeds the configured size limit.
    #[error("pack too large")]
    TooLarge,

    /// Client identity could not be resolved (proxy misconfiguration).
    #[error("client identity unavailable")]
    Identity(#[from] IdentityError),

    /// The content store failed while registering an upload.
    #[error("{}", content_message(.0))]
    Content(#[from] ContentError),

    /// The content store failed while serving a download.
    #[error("download failed")]
    Fetch(ContentError),
}

fn content_message(e: &ContentError) -> &'static str {
    if e.is_storage_full() {
        "storage full"
    } else {
        "upload failed"
    }
}

impl ApiError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownApplication | Self::LicenseDisabled => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Content(e) if e.is_storage_full() => StatusCode::INSUFFICIENT_STORAGE,
            Self::Content(_) | Self::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this was a gatekeeping refusal rather than a failure.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::UnknownApplication | Self::LicenseDisabled)
    }

    /// Log at the level the failure deserves.
    pub fn log(&self, route: &str) {
        match self {
            Self::Identity(e) => tracing::error!(route, "Cannot resolve client identity: {}", e),
            Self::Content(e) | Self::Fetch(e) => {
                tracing::error!(route, "Content store failure: {}", e)
            }
            Self::BadRequest(reason) => tracing::debug!(route, "Bad request: {}", reason),
            Self::TooLarge => tracing::debug!(route, "Pack too large"),
            Self::UnknownApplication | Self::LicenseDisabled => {}
        }
    }

    /// Render as `{"error": ...}`.
    ///
    /// With `legacy` set the status is always 200, as older clients expect.
    pub fn into_response_for(self, legacy: bool) -> Response {
        let status = if legacy { StatusCode::OK } else { self.status() };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_for(false)
    }
}
