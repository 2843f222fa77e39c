//! Configuration loading for pack-server.
//!
//! Configuration is loaded once from a TOML file (default: `pack-server.toml`)
//! and never mutated afterwards.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for pack-server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Reverse proxy configuration.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Agent gatekeeping configuration.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address for HTTP server (default: 0.0.0.0:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Public base URL used to build download links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Answer logical errors with 200 and an error body, as older clients
    /// expect (default: false).
    #[serde(default)]
    pub legacy_status_codes: bool,
}

/// Reverse proxy configuration.
///
/// Only enable when the server is reachable exclusively through the proxy:
/// the IP header is trusted as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Take the client IP from `ip_header` (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Header carrying the client IP (default: X-Real-IP).
    #[serde(default = "default_ip_header")]
    pub ip_header: String,
}

/// Agent allow-lists and reject policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Refuse unknown agents where the per-class flag also says so (default: false).
    #[serde(default)]
    pub block_unknown_agents: bool,
    /// Reject unknown agents on upload when blocking (default: true).
    #[serde(default = "default_reject_upload")]
    pub reject_upload: bool,
    /// Reject unknown agents on download when blocking (default: false).
    #[serde(default)]
    pub reject_download: bool,
    /// Known agent patterns per policy class.
    #[serde(default)]
    pub known_agents: KnownAgents,
    /// External ids whose uploads are refused.
    #[serde(default)]
    pub blocked_ids: BTreeSet<String>,
}

/// Case-insensitive full-match patterns, per policy class.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnownAgents {
    /// Patterns for `POST /upload`.
    #[serde(default)]
    pub upload: Vec<String>,
    /// Patterns for `GET /pack.zip`.
    #[serde(default)]
    pub download: Vec<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite registration database.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Directory holding pack artifacts.
    #[serde(default = "default_packs_dir")]
    pub packs_dir: PathBuf,
    /// Maximum pack size in bytes (default: 100MB).
    #[serde(default = "default_max_pack_size")]
    pub max_pack_size: usize,
    /// Upper bound on a pack lookup in milliseconds (default: 10s).
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl StorageConfig {
    /// Fetch timeout as a Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
    /// Cleanup interval in seconds (default: 3600 = 1 hour).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Age after which an orphaned staging file is deleted (default: 1 day).
    #[serde(default = "default_staging_max_age")]
    pub staging_max_age_secs: u64,
}

// Default value functions
fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_ip_header() -> String {
    "X-Real-IP".to_string()
}

fn default_reject_upload() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("packhost.db")
}

fn default_packs_dir() -> PathBuf {
    PathBuf::from("packs")
}

fn default_max_pack_size() -> usize {
    100 * 1024 * 1024 // 100MB
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

fn default_staging_max_age() -> u64 {
    24 * 60 * 60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind(),
            public_url: default_public_url(),
            metrics_enabled: default_metrics_enabled(),
            legacy_status_codes: false,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ip_header: default_ip_header(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            block_unknown_agents: false,
            reject_upload: default_reject_upload(),
            reject_download: false,
            known_agents: KnownAgents::default(),
            blocked_ids: BTreeSet::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            packs_dir: default_packs_dir(),
            max_pack_size: default_max_pack_size(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_cleanup_enabled(),
            interval_secs: default_cleanup_interval(),
            staging_max_age_secs: default_staging_max_age(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.public_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "http.public_url must not be empty".to_string(),
            });
        }
        if self.proxy.enabled && self.proxy.ip_header.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "proxy.ip_header must be set when proxy.enabled is true".to_string(),
            });
        }
        if self.storage.max_pack_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "storage.max_pack_size must be > 0".to_string(),
            });
        }
        if self.storage.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "storage.fetch_timeout_ms must be > 0".to_string(),
            });
        }
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "cleanup.interval_secs must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.bind_address, "0.0.0.0:8080");
        assert_eq!(config.proxy.ip_header, "X-Real-IP");
        assert!(!config.proxy.enabled);
        assert_eq!(config.storage.max_pack_size, 100 * 1024 * 1024);
        assert!(config.security.reject_upload);
        assert!(!config.security.reject_download);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[http]
bind_address = "127.0.0.1:9000"
public_url = "https://packs.example.net"
legacy_status_codes = true

[proxy]
enabled = true
ip_header = "X-Forwarded-For"

[security]
block_unknown_agents = true
reject_download = true
blocked_ids = ["12345"]

[security.known_agents]
upload = ["MyLauncher/1\\.0", "Java/.*"]
download = ["Minecraft.*"]

[storage]
database = "/data/packhost.db"
packs_dir = "/data/packs"
fetch_timeout_ms = 2500

[cleanup]
interval_secs = 1800
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.bind_address, "127.0.0.1:9000");
        assert_eq!(config.http.public_url, "https://packs.example.net");
        assert!(config.http.legacy_status_codes);
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.ip_header, "X-Forwarded-For");
        assert!(config.security.block_unknown_agents);
        assert!(config.security.reject_upload);
        assert!(config.security.reject_download);
        assert!(config.security.blocked_ids.contains("12345"));
        assert_eq!(config.security.known_agents.upload[0], "MyLauncher/1\\.0");
        assert_eq!(config.security.known_agents.download, vec!["Minecraft.*"]);
        assert_eq!(config.storage.packs_dir, PathBuf::from("/data/packs"));
        assert_eq!(config.storage.fetch_timeout(), Duration::from_millis(2500));
        assert_eq!(config.cleanup.interval_secs, 1800);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.database, PathBuf::from("packhost.db"));
        assert_eq!(config.cleanup.staging_max_age_secs, 24 * 60 * 60);
        assert!(config.security.known_agents.upload.is_empty());
    }

    #[test]
    fn proxy_without_header_is_rejected() {
        let mut config = Config::default();
        config.proxy.enabled = true;
        config.proxy.ip_header = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_fetch_timeout_is_rejected() {
        let mut config = Config::default();
        config.storage.fetch_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_public_url_is_rejected() {
        let mut config = Config::default();
        config.http.public_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/pack-server.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack-server.toml");
        std::fs::write(&path, "[storage]\nmax_pack_size = 0\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
