//! # Payload Schemas
//!
//! Declarative field tables for the envelope and for every payload kind.
//! The validator walks these tables; the typed structs in
//! [`crate::payloads`] mirror them field for field.

use crate::kinds::MessageType;
use crate::payloads::{LearningEventType, NotificationLevel};

/// Shape constraint for a single JSON value.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Any JSON string.
    String,
    /// A string with at least one non-whitespace character.
    NonEmptyString,
    Bool,
    /// A non-negative integer.
    Unsigned,
    /// A non-negative integer no larger than the bound.
    UnsignedMax(u64),
    /// A JSON object with arbitrary content.
    Object,
    /// Any JSON value, including `null`.
    Any,
    /// A string from a fixed set.
    OneOf(&'static [&'static str]),
    /// A [`crate::SourceRole`] wire name.
    Role,
    /// An array whose elements all have the inner kind.
    Array(&'static FieldKind),
    /// An object whose values all have the inner kind.
    Map(&'static FieldKind),
    /// An object with its own closed field table.
    Nested(&'static [FieldSpec]),
}

/// One named field of an object schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn req(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

const STRING_LIST: FieldKind = FieldKind::Array(&FieldKind::String);

/// Envelope fields other than `type`, which the validator checks separately.
pub const ENVELOPE: &[FieldSpec] = &[
    req("messageId", FieldKind::NonEmptyString),
    req("timestamp", FieldKind::Unsigned),
    req("source", FieldKind::Role),
    opt("target", FieldKind::Role),
    opt("version", FieldKind::NonEmptyString),
    opt("correlationId", FieldKind::NonEmptyString),
    opt("timeoutMs", FieldKind::Unsigned),
    opt("metadata", FieldKind::Object),
    req("payload", FieldKind::Object),
];

const CONNECT: &[FieldSpec] = &[
    opt("name", FieldKind::String),
    opt("version", FieldKind::String),
    opt("capabilities", STRING_LIST),
];

const DISCONNECT: &[FieldSpec] = &[opt("reason", FieldKind::String)];

const EMPTY: &[FieldSpec] = &[];

const FILE_OPEN: &[FieldSpec] = &[
    req("filePath", FieldKind::NonEmptyString),
    opt("line", FieldKind::Unsigned),
    opt("column", FieldKind::Unsigned),
    opt("context", FieldKind::Any),
];

const FILE_OPENED: &[FieldSpec] = &[
    req("filePath", FieldKind::NonEmptyString),
    req("success", FieldKind::Bool),
    opt("error", FieldKind::String),
];

const FILE_CLOSE: &[FieldSpec] = &[req("filePath", FieldKind::NonEmptyString)];

const PROJECT_OPEN: &[FieldSpec] = &[
    req("projectPath", FieldKind::NonEmptyString),
    opt("context", FieldKind::Any),
];

const PROJECT_SYNC: &[FieldSpec] = &[
    req("projectPath", FieldKind::NonEmptyString),
    opt("files", STRING_LIST),
];

const LEARNING_EVENT: &[FieldSpec] = &[
    req("eventType", FieldKind::OneOf(LearningEventType::WIRE_NAMES)),
    req("data", FieldKind::Any),
    req("source", FieldKind::NonEmptyString),
];

const LEARNING_SYNC: &[FieldSpec] = &[
    req("entries", FieldKind::Array(&FieldKind::Any)),
    opt("since", FieldKind::Unsigned),
];

const NOTIFICATION: &[FieldSpec] = &[
    req("level", FieldKind::OneOf(NotificationLevel::WIRE_NAMES)),
    req("title", FieldKind::String),
    req("message", FieldKind::String),
];

const GIT_STATUS_UPDATE: &[FieldSpec] = &[
    req("branch", FieldKind::String),
    req("modified", STRING_LIST),
    req("added", STRING_LIST),
    req("deleted", STRING_LIST),
    req("untracked", STRING_LIST),
];

const COMMAND_REQUEST: &[FieldSpec] = &[
    req("text", FieldKind::NonEmptyString),
    opt("target", FieldKind::Role),
    opt("context", FieldKind::Any),
    opt("metadata", FieldKind::Object),
];

const COMMAND_EXECUTE: &[FieldSpec] = &[
    req("commandId", FieldKind::NonEmptyString),
    req("command", FieldKind::NonEmptyString),
    opt("args", STRING_LIST),
    req("text", FieldKind::String),
    req("originalSender", FieldKind::Role),
];

const COMMAND_RESULT: &[FieldSpec] = &[
    req("commandId", FieldKind::NonEmptyString),
    req("success", FieldKind::Bool),
    opt("result", FieldKind::Any),
    opt("error", FieldKind::String),
    opt("metrics", FieldKind::Object),
];

const COMMAND_RESPONSE: &[FieldSpec] = &[
    req("commandId", FieldKind::NonEmptyString),
    req("success", FieldKind::Bool),
    opt("result", FieldKind::Any),
    opt("error", FieldKind::String),
    opt("metrics", FieldKind::Object),
    opt("targetClientId", FieldKind::NonEmptyString),
];

const SERVER_STATS: &[FieldSpec] = &[
    req("uptime", FieldKind::Unsigned),
    req("port", FieldKind::UnsignedMax(u16::MAX as u64)),
];

const CONNECTION_STATS: &[FieldSpec] = &[
    req("active", FieldKind::Unsigned),
    req("total", FieldKind::Unsigned),
    req("disconnections", FieldKind::Unsigned),
];

const MESSAGE_STATS: &[FieldSpec] = &[
    req("total", FieldKind::Unsigned),
    req("byType", FieldKind::Map(&FieldKind::Unsigned)),
    req("recentCount", FieldKind::Unsigned),
    opt("rejected", FieldKind::Unsigned),
];

const CLIENT_STATS: &[FieldSpec] = &[
    req("id", FieldKind::NonEmptyString),
    req("source", FieldKind::Role),
    req("messageCount", FieldKind::Unsigned),
    req("connected", FieldKind::Unsigned),
];

const BRIDGE_STATS: &[FieldSpec] = &[
    req("server", FieldKind::Nested(SERVER_STATS)),
    req("connections", FieldKind::Nested(CONNECTION_STATS)),
    req("messages", FieldKind::Nested(MESSAGE_STATS)),
    req("clients", FieldKind::Array(&FieldKind::Nested(CLIENT_STATS))),
];

const ERROR: &[FieldSpec] = &[
    req("code", FieldKind::NonEmptyString),
    req("message", FieldKind::String),
    opt("details", FieldKind::Any),
];

const ACK: &[FieldSpec] = &[req("messageId", FieldKind::NonEmptyString)];

/// The payload schema registered for a message kind.
#[must_use]
pub fn payload_schema(kind: MessageType) -> &'static [FieldSpec] {
    match kind {
        MessageType::Connect => CONNECT,
        MessageType::Disconnect => DISCONNECT,
        MessageType::Ping | MessageType::Pong | MessageType::GetGitStatus => EMPTY,
        MessageType::FileOpen => FILE_OPEN,
        MessageType::FileOpened => FILE_OPENED,
        MessageType::FileClose => FILE_CLOSE,
        MessageType::ProjectOpen => PROJECT_OPEN,
        MessageType::ProjectSync => PROJECT_SYNC,
        MessageType::LearningEvent => LEARNING_EVENT,
        MessageType::LearningSync => LEARNING_SYNC,
        MessageType::Notification => NOTIFICATION,
        MessageType::GitStatusUpdate => GIT_STATUS_UPDATE,
        MessageType::CommandRequest => COMMAND_REQUEST,
        MessageType::CommandExecute => COMMAND_EXECUTE,
        MessageType::CommandResult => COMMAND_RESULT,
        MessageType::CommandResponse => COMMAND_RESPONSE,
        MessageType::BridgeStats => BRIDGE_STATS,
        MessageType::Error => ERROR,
        MessageType::Ack => ACK,
    }
}

/// Names of the required payload fields for a kind.
#[must_use]
pub fn required_fields(kind: MessageType) -> Vec<&'static str> {
    payload_schema(kind)
        .iter()
        .filter(|spec| spec.required)
        .map(|spec| spec.name)
        .collect()
}
