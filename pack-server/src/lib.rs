//! # pack-server
//!
//! HTTP registry for content-addressed resource packs.
//!
//! Game servers upload a pack under their own id and get back a public URL
//! keyed by the pack's SHA-1. Game clients download by that hash.
//!
//! ## Architecture
//!
//! ```text
//! Game server ──POST /upload──┐          ┌──GET /pack.zip?id=<sha1>── Game client
//!                             ▼          ▼
//!        ┌─────────────────────────────────────────┐
//!        │               pack-server               │
//!        │  identity ──► gatekeeper ──► handlers   │
//!        │                               │         │
//!        │               ContentStore ◄──┘         │
//!        │      ┌──────────────┬─────────────┐     │
//!        │      │ FsStore      │ SQLite log  │     │
//!        │      │ (artifacts)  │ (audit)     │     │
//!        │      └──────────────┴─────────────┘     │
//!        └─────────────────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `POST /upload` - multipart `pack` + `id`, returns `{url, sha1}`
//! - `GET /pack.zip?id=<sha1>` - the stored pack
//! - `GET /debug` - liveness probe
//! - `GET /health` - JSON health status
//! - `GET /metrics` - Prometheus counters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod http;
pub mod identity;
pub mod server;
pub mod storage;
