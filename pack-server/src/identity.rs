//! Client identity resolution.
//!
//! ## Trust boundary
//!
//! With `proxy.enabled`, the client IP is read from the configured header and
//! trusted as-is. Anyone who can reach the server directly can forge that
//! header, so only enable it when the server is reachable exclusively through
//! the proxy that sets it.

use crate::config::{ConfigError, ProxyConfig};
use axum::http::{HeaderMap, HeaderName};
use std::net::{IpAddr, SocketAddr};

/// Resolves the effective client IP of a request.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    /// Header to read when behind the proxy; `None` when proxying is off.
    header: Option<HeaderName>,
}

impl IdentityResolver {
    /// Build a resolver, validating the header name once.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        if !config.enabled {
            return Ok(Self { header: None });
        }
        let header = HeaderName::try_from(config.ip_header.trim()).map_err(|e| {
            ConfigError::Invalid {
                reason: format!("proxy.ip_header {:?}: {}", config.ip_header, e),
            }
        })?;
        Ok(Self {
            header: Some(header),
        })
    }

    /// Whether the IP is taken from a proxy header.
    pub fn is_proxied(&self) -> bool {
        self.header.is_some()
    }

    /// Resolve the caller's IP.
    ///
    /// Behind the proxy the first comma-separated entry of the header is used,
    /// so `X-Forwarded-For` chains resolve to the originating client. An entry
    /// carrying a port (`1.2.3.4:80`, `[::1]:443`) resolves to its address.
    /// Otherwise the transport peer address is used and headers are ignored.
    pub fn resolve(&self, headers: &HeaderMap, peer: SocketAddr) -> Result<IpAddr, IdentityError> {
        let Some(header) = &self.header else {
            return Ok(peer.ip());
        };

        let value = headers
            .get(header)
            .ok_or_else(|| IdentityError::MissingHeader {
                header: header.to_string(),
            })?;

        let raw = value.to_str().map_err(|_| IdentityError::InvalidHeader {
            header: header.to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })?;

        raw.split(',')
            .next()
            .map(str::trim)
            .and_then(parse_ip)
            .ok_or_else(|| IdentityError::InvalidHeader {
                header: header.to_string(),
                value: raw.to_string(),
            })
    }
}

/// A bare address, or one with a port as some proxies send it.
fn parse_ip(s: &str) -> Option<IpAddr> {
    s.parse::<IpAddr>()
        .or_else(|_| s.parse::<SocketAddr>().map(|addr| addr.ip()))
        .ok()
}

/// Identity resolution failures.
///
/// These are deployment errors (the proxy is not setting the header), not
/// client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Proxying is enabled but the request lacks the IP header.
    #[error("proxy header {header} missing from request")]
    MissingHeader {
        /// Configured header name.
        header: String,
    },
    /// The IP header does not hold an IP address.
    #[error("proxy header {header} holds no IP address: {value:?}")]
    InvalidHeader {
        /// Configured header name.
        header: String,
        /// Raw header value.
        value: String,
    },
}
