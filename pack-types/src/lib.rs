//! # pack-types
//!
//! Shared types for packhost.
//!
//! This crate provides the foundational types used across the packhost crates:
//! - [`ContentHash`] - Content address of a pack (SHA-1, hex rendered)
//! - [`PolicyClass`] - Operation category evaluated by the agent gatekeeper
//! - [`UploadResponse`], [`ErrorResponse`] - JSON bodies returned over HTTP
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod wire;

pub use error::TypesError;
pub use hash::{ContentHash, HASH_HEX_LEN, HASH_SIZE};
pub use wire::{ErrorResponse, PolicyClass, UploadResponse};
