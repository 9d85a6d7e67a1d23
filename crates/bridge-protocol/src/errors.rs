//! # Error Types
//!
//! Errors raised while encoding messages, plus the error codes carried in
//! `error` payloads.

use crate::validation::ValidationReport;
use thiserror::Error;

/// Error codes used in `error` payloads.
pub mod codes {
    /// Frame is not valid JSON.
    pub const INVALID_JSON: &str = "INVALID_JSON";
    /// Frame is JSON but not a legal message.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    /// Frame exceeds the hub's size limit.
    pub const MESSAGE_TOO_LARGE: &str = "MESSAGE_TOO_LARGE";
    /// No connected peer can execute a command request.
    pub const NO_EXECUTOR: &str = "NO_EXECUTOR";
    /// A command result references a command the hub is not tracking.
    pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";
    /// The addressed role has no live connection.
    pub const TARGET_NOT_CONNECTED: &str = "TARGET_NOT_CONNECTED";
}

/// Errors from the protocol layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// A message failed its structural self-check.
    #[error(transparent)]
    Invalid(#[from] ValidationReport),
}
