//! Storage layer for pack-server.
//!
//! Pack artifacts live in a [`pack_content::FsStore`]; this module persists
//! the registration audit log.

mod sqlite;

pub use sqlite::SqliteRegistry;
