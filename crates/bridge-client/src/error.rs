//! Client-side error types.

use bridge_protocol::{ErrorPayload, ProtocolError};
use thiserror::Error;

/// Why a pending command did not produce a result.
///
/// Cloneable so that one failure (e.g. transport loss) can be delivered to
/// every outstanding caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No result arrived before the deadline.
    #[error("Command request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The connection carrying the command went away.
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// The command was rejected locally.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// The hub or the executing peer answered with an `error` message.
    #[error("{code}: {message}")]
    Remote { code: String, message: String },

    /// A command with the same id is already pending.
    #[error("command {0} is already pending")]
    Duplicate(String),

    /// Bookkeeping was cleared before the command settled.
    #[error("command was abandoned before it settled")]
    Abandoned,
}

impl CommandError {
    /// True for the timeout outcome.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::Timeout { .. })
    }
}

impl From<ErrorPayload> for CommandError {
    fn from(payload: ErrorPayload) -> Self {
        CommandError::Remote {
            code: payload.code,
            message: payload.message,
        }
    }
}

/// Transport-level failures reported by a [`crate::transport::Connector`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("transport send failed: {0}")]
    Send(String),

    #[error("transport receive failed: {0}")]
    Receive(String),

    #[error("transport closed")]
    Closed,
}

/// Errors surfaced by [`crate::connection::ConnectionManager`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Command(#[from] CommandError),

    /// A newer `connect()` or `disconnect()` took over while this attempt was in flight.
    #[error("connection attempt superseded")]
    Superseded,
}
