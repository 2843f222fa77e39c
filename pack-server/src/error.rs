//! Error types for pack-server.

use pack_content::ContentError;
use std::path::PathBuf;

/// Main error type for pack-server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Registration database error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Agent pattern error.
    #[error("gatekeeper error: {0}")]
    Gatekeeper(#[from] crate::gatekeeper::GatekeeperError),

    /// Content store error.
    #[error("content error: {0}")]
    Content(#[from] ContentError),
}

/// Registration database errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded.
    #[error("corrupt registration row: {reason}")]
    CorruptRow {
        /// What was wrong with the row.
        reason: String,
    },

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

impl From<StorageError> for ContentError {
    fn from(e: StorageError) -> Self {
        ContentError::Log(e.to_string())
    }
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_surface_as_log_errors() {
        let err = ContentError::from(StorageError::CorruptRow {
            reason: "bad hash".to_string(),
        });
        assert!(matches!(err, ContentError::Log(ref msg) if msg.contains("bad hash")));
    }

    #[test]
    fn server_error_wraps_storage() {
        let err = ServerError::from(StorageError::InvalidPath {
            path: PathBuf::from("/nowhere"),
        });
        assert!(err.to_string().starts_with("storage error"));
    }
}
