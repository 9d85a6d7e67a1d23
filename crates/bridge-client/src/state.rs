//! Observable connection state.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of the single logical hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the connection for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    /// When the last `pong` arrived.
    pub last_pong: Option<Instant>,
    /// Messages waiting in the outbound queue.
    pub queued: usize,
    pub last_error: Option<String>,
    /// Attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Messages discarded because the queue was full.
    pub dropped_messages: u64,
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            last_pong: None,
            queued: 0,
            last_error: None,
            reconnect_attempts: 0,
            dropped_messages: 0,
        }
    }
}

impl ConnectionSnapshot {
    /// Time since the last heartbeat reply, if one was ever received.
    #[must_use]
    pub fn since_last_pong(&self) -> Option<Duration> {
        self.last_pong.map(|at| at.elapsed())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let snapshot = ConnectionSnapshot::default();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert!(snapshot.since_last_pong().is_none());
        assert!(!snapshot.is_connected());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Error).unwrap(),
            serde_json::json!("error")
        );
    }
}
