//! Hub configuration with validation.
//!
//! Loaded from TOML; every field has a default so a partial file (or none
//! at all) is valid. Durations use human-readable strings such as `"5s"`.

use bridge_protocol::DEFAULT_HUB_PORT;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default largest accepted frame (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default capacity of the recent-message log.
pub const DEFAULT_RECENT_LOG_CAPACITY: usize = 100;

/// Relay hub configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Bind address (loopback by default; peers are local desktop apps)
    pub host: IpAddr,
    /// Port (default: 5004)
    pub port: u16,
    /// Frames larger than this are answered with `MESSAGE_TOO_LARGE`
    pub max_message_size: usize,
    /// Period of the `bridge_stats` broadcast
    #[serde(with = "humantime_serde")]
    pub stats_interval: Duration,
    /// In-flight command routes older than this are dropped
    #[serde(with = "humantime_serde")]
    pub route_ttl: Duration,
    /// Entries kept in the recent-message log
    pub recent_log_capacity: usize,
    /// Per-connection outbound frame buffer
    pub outbound_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_HUB_PORT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            stats_interval: Duration::from_secs(5),
            route_ttl: Duration::from_secs(300),
            recent_log_capacity: DEFAULT_RECENT_LOG_CAPACITY,
            outbound_buffer: 1024,
        }
    }
}

impl HubConfig {
    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse(reason) => ConfigError::Load {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.recent_log_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "recent_log_capacity cannot be 0".into(),
            ));
        }

        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "outbound_buffer cannot be 0".into(),
            ));
        }

        if self.stats_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "stats_interval cannot be 0".into(),
            ));
        }

        if self.route_ttl.is_zero() {
            return Err(ConfigError::InvalidTimeout("route_ttl cannot be 0".into()));
        }

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read or parsed
    #[error("cannot load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    /// TOML syntax or type error
    #[error("invalid TOML: {0}")]
    Parse(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid interval or timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
