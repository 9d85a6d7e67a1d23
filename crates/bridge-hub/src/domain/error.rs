//! Hub error types.

use super::config::ConfigError;
use bridge_telemetry::TelemetryError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors surfaced by the hub server.
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

pub type HubResult<T> = Result<T, HubError>;

/// Why a single delivery to a connected client failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The client's outbound buffer is full.
    #[error("outbound buffer full")]
    Full,
    /// The client's writer task has ended.
    #[error("client gone")]
    Gone,
}
