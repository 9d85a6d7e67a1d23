//! # Message Kinds
//!
//! The `type` discriminant of the envelope. It decides which payload schema
//! applies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// All message kinds that can travel over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageType {
    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================
    #[serde(rename = "connect")]
    Connect,
    #[serde(rename = "disconnect")]
    Disconnect,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,

    // =========================================================================
    // FILE EVENTS
    // =========================================================================
    #[serde(rename = "file:open")]
    FileOpen,
    #[serde(rename = "file:opened")]
    FileOpened,
    #[serde(rename = "file:close")]
    FileClose,

    // =========================================================================
    // PROJECT / LEARNING SYNC
    // =========================================================================
    #[serde(rename = "project:open")]
    ProjectOpen,
    #[serde(rename = "project:sync")]
    ProjectSync,
    #[serde(rename = "learning_event")]
    LearningEvent,
    #[serde(rename = "learning:sync")]
    LearningSync,
    #[serde(rename = "notification")]
    Notification,

    // =========================================================================
    // LEGACY GIT STATUS
    // =========================================================================
    #[serde(rename = "get_git_status")]
    GetGitStatus,
    #[serde(rename = "git_status_update")]
    GitStatusUpdate,

    // =========================================================================
    // FOUR-STAGE COMMAND FLOW
    // =========================================================================
    #[serde(rename = "command_request")]
    CommandRequest,
    #[serde(rename = "command_execute")]
    CommandExecute,
    #[serde(rename = "command_result")]
    CommandResult,
    #[serde(rename = "command_response")]
    CommandResponse,

    // =========================================================================
    // TELEMETRY AND META
    // =========================================================================
    #[serde(rename = "bridge_stats")]
    BridgeStats,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "ack")]
    Ack,
}

impl MessageType {
    /// Every message kind, in declaration order.
    pub const ALL: [MessageType; 21] = [
        MessageType::Connect,
        MessageType::Disconnect,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::FileOpen,
        MessageType::FileOpened,
        MessageType::FileClose,
        MessageType::ProjectOpen,
        MessageType::ProjectSync,
        MessageType::LearningEvent,
        MessageType::LearningSync,
        MessageType::Notification,
        MessageType::GetGitStatus,
        MessageType::GitStatusUpdate,
        MessageType::CommandRequest,
        MessageType::CommandExecute,
        MessageType::CommandResult,
        MessageType::CommandResponse,
        MessageType::BridgeStats,
        MessageType::Error,
        MessageType::Ack,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Connect => "connect",
            MessageType::Disconnect => "disconnect",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::FileOpen => "file:open",
            MessageType::FileOpened => "file:opened",
            MessageType::FileClose => "file:close",
            MessageType::ProjectOpen => "project:open",
            MessageType::ProjectSync => "project:sync",
            MessageType::LearningEvent => "learning_event",
            MessageType::LearningSync => "learning:sync",
            MessageType::Notification => "notification",
            MessageType::GetGitStatus => "get_git_status",
            MessageType::GitStatusUpdate => "git_status_update",
            MessageType::CommandRequest => "command_request",
            MessageType::CommandExecute => "command_execute",
            MessageType::CommandResult => "command_result",
            MessageType::CommandResponse => "command_response",
            MessageType::BridgeStats => "bridge_stats",
            MessageType::Error => "error",
            MessageType::Ack => "ack",
        }
    }

    /// Parse a wire name. Returns `None` for unknown kinds.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == s)
    }

    /// True for the four stages of the command flow.
    #[must_use]
    pub fn is_command_flow(&self) -> bool {
        matches!(
            self,
            MessageType::CommandRequest
                | MessageType::CommandExecute
                | MessageType::CommandResult
                | MessageType::CommandResponse
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
