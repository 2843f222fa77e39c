//! JSON bodies exchanged at the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ContentHash;

/// The operation category whose agent allow-list is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyClass {
    /// `POST /upload`
    Upload,
    /// `GET /pack.zip`
    Download,
}

impl PolicyClass {
    /// Lowercase name, as used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful upload response.
///
/// The field is named `sha1` because clients verify the downloaded pack
/// against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Download URL embedding the content hash as the `id` query parameter.
    pub url: String,
    /// Content hash of the uploaded pack.
    pub sha1: ContentHash,
}

impl UploadResponse {
    /// Build the response for `hash`, pointing at `public_url`.
    pub fn new(public_url: &str, hash: ContentHash) -> Self {
        Self {
            url: format!("{}/pack.zip?id={}", public_url.trim_end_matches('/'), hash),
            sha1: hash,
        }
    }
}

/// Error body: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    /// Create an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_embeds_hash_in_url() {
        let hash = ContentHash::of(b"abc");
        let resp = UploadResponse::new("https://packs.example.net", hash);
        assert_eq!(
            resp.url,
            "https://packs.example.net/pack.zip?id=a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(resp.sha1, hash);
    }

    #[test]
    fn upload_response_trims_trailing_slash() {
        let hash = ContentHash::of(b"abc");
        let resp = UploadResponse::new("http://localhost:8080/", hash);
        assert!(resp.url.starts_with("http://localhost:8080/pack.zip?id="));
    }

    #[test]
    fn upload_response_json_shape() {
        let resp = UploadResponse::new("http://h", ContentHash::of(b"abc"));
        let json: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["sha1"], "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert!(json["url"].as_str().unwrap().ends_with(json["sha1"].as_str().unwrap()));
    }

    #[test]
    fn error_response_json_shape() {
        let json = serde_json::to_string(&ErrorResponse::new("Unknown Application")).unwrap();
        assert_eq!(json, r#"{"error":"Unknown Application"}"#);
    }

    #[test]
    fn policy_class_serde_is_lowercase() {
        let json = serde_json::to_string(&PolicyClass::Download).unwrap();
        assert_eq!(json, "\"download\"");
        let back: PolicyClass = serde_json::from_str("\"upload\"").unwrap();
        assert_eq!(back, PolicyClass::Upload);
    }

    #[test]
    fn policy_class_display() {
        assert_eq!(PolicyClass::Upload.to_string(), "upload");
        assert_eq!(PolicyClass::Download.to_string(), "download");
    }
}
