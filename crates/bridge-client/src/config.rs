//! Connection manager configuration with validation.

use bridge_protocol::{SourceRole, DEFAULT_HUB_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default bound of the outbound queue while disconnected.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 1000;

/// Per-process connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hub endpoint.
    pub url: String,
    /// Role this process announces as `source`.
    pub role: SourceRole,
    /// Display name sent in the `connect` announcement.
    pub name: Option<String>,
    /// Capabilities sent in the `connect` announcement.
    pub capabilities: Vec<String>,
    /// Outbound queue bound; overflow drops the oldest entry.
    pub max_queue_len: usize,
    /// Interval between heartbeat pings.
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Deadline used by `request_command` when the caller gives none.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    /// Buffer of the application event channel.
    pub event_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HUB_URL.to_string(),
            role: SourceRole::Cli,
            name: None,
            capabilities: Vec::new(),
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
            heartbeat_interval: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            event_capacity: 256,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults for `role`.
    pub fn for_role(role: SourceRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(self.url.clone()));
        }
        if self.role == SourceRole::Hub {
            return Err(ConfigError::Invalid(
                "a client cannot connect as the hub role".into(),
            ));
        }
        if self.max_queue_len == 0 {
            return Err(ConfigError::Invalid("max_queue_len cannot be 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity cannot be 0".into()));
        }
        if self.heartbeat_interval.is_zero() || self.command_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "heartbeat_interval and command_timeout must be positive".into(),
            ));
        }
        self.reconnect.validate()
    }
}

/// Automatic reconnect schedule.
///
/// Delays grow geometrically from `initial_delay` by `multiplier`, capped at
/// `max_delay`. `max_attempts = None` retries forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect automatically.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` when the
    /// policy gives up.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt == 0 {
            return None;
        }
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64).round();
        Some(Duration::from_millis(capped as u64))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier < 1.0 || !self.multiplier.is_finite() {
            return Err(ConfigError::Invalid(
                "reconnect multiplier must be >= 1".into(),
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::InvalidTimeout(
                "reconnect initial_delay exceeds max_delay".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
