//! Error types for pack-content.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during content operations.
///
/// A missing pack is not an error; lookups report it as a value.
#[derive(Error, Debug)]
pub enum ContentError {
    /// The backing medium has no space left for the write.
    #[error("storage full while writing {path}")]
    StorageFull {
        /// Path that could not be written.
        path: PathBuf,
    },

    /// Any other I/O failure against the backing medium.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The registration log rejected a write or query.
    #[error("registration log error: {0}")]
    Log(String),
}

impl ContentError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::StorageFull {
            Self::StorageFull { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Whether this is a full-medium condition.
    pub fn is_storage_full(&self) -> bool {
        matches!(self, Self::StorageFull { .. })
    }
}
