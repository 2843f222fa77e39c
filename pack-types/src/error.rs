//! Error types for pack-types.

use thiserror::Error;

/// Errors produced while parsing shared types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    /// A content hash string was not 40 hex characters.
    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),
}
