//! # Payloads
//!
//! One struct per payload shape. Field names on the wire are camelCase and
//! payloads are closed: unknown fields are rejected.

use crate::kinds::MessageType;
use crate::roles::SourceRole;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Open key/value map used for `metadata` and `metrics`.
pub type JsonMap = Map<String, Value>;

/// Keeps an explicit `null` as `Some(Value::Null)`; only an absent field is `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

// =============================================================================
// CONNECTION LIFECYCLE
// =============================================================================

/// Announcement sent by a peer right after its transport opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DisconnectPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload of `ping`, `pong` and `get_git_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyPayload {}

// =============================================================================
// FILE EVENTS
// =============================================================================

/// Request to open a file, optionally at a position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileOpenPayload {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Confirmation that a `file:open` was handled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileOpenedPayload {
    pub file_path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileClosePayload {
    pub file_path: String,
}

// =============================================================================
// PROJECT / LEARNING SYNC
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectOpenPayload {
    pub project_path: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectSyncPayload {
    pub project_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

/// Category of a learning event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningEventType {
    Mistake,
    Knowledge,
    Pattern,
}

impl LearningEventType {
    pub const WIRE_NAMES: &'static [&'static str] = &["mistake", "knowledge", "pattern"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LearningEventPayload {
    pub event_type: LearningEventType,
    pub data: Value,
    /// Where the learning came from (free-form, not a peer role).
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LearningSyncPayload {
    pub entries: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub const WIRE_NAMES: &'static [&'static str] = &["info", "success", "warning", "error"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationPayload {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

// =============================================================================
// LEGACY GIT STATUS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitStatusPayload {
    pub branch: String,
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub untracked: Vec<String>,
}

// =============================================================================
// FOUR-STAGE COMMAND FLOW
// =============================================================================

/// Stage 1: a peer asks for a command to be run somewhere else.
///
/// The envelope's `messageId` becomes the command id and `timeoutMs` carries
/// the requester's deadline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandRequestPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SourceRole>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonMap>,
}

/// Stage 2: the hub tells the resolving peer to run the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandExecutePayload {
    pub command_id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    pub text: String,
    /// Role of the peer that issued the request.
    pub original_sender: SourceRole,
}

/// Stage 3: the executing peer reports the outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandResultPayload {
    pub command_id: String,
    pub success: bool,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JsonMap>,
}

impl CommandResultPayload {
    /// Successful outcome carrying `result`.
    pub fn ok(command_id: impl Into<String>, result: Value) -> Self {
        Self {
            command_id: command_id.into(),
            success: true,
            result: Some(result),
            ..Self::default()
        }
    }

    /// Failed outcome carrying an error message.
    pub fn failed(command_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Stage 4: the hub hands the result back to the requester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandResponsePayload {
    pub command_id: String,
    pub success: bool,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JsonMap>,
    /// Exact connection the response is meant for, when several connections
    /// share the requester's role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_client_id: Option<String>,
}

impl CommandResponsePayload {
    /// Wrap an executor's result for delivery to the requester.
    pub fn from_result(result: CommandResultPayload, target_client_id: Option<String>) -> Self {
        Self {
            command_id: result.command_id,
            success: result.success,
            result: result.result,
            error: result.error,
            metrics: result.metrics,
            target_client_id,
        }
    }

    /// The result fields, without the routing hint.
    pub fn into_result(self) -> CommandResultPayload {
        CommandResultPayload {
            command_id: self.command_id,
            success: self.success,
            result: self.result,
            error: self.error,
            metrics: self.metrics,
        }
    }
}

// =============================================================================
// BRIDGE TELEMETRY
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerStats {
    /// Seconds since the hub started.
    pub uptime: u64,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionStats {
    pub active: u64,
    pub total: u64,
    pub disconnections: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageStats {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    pub recent_count: u64,
    /// Frames refused by validation (never routed).
    #[serde(default)]
    pub rejected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientStats {
    pub id: String,
    pub source: SourceRole,
    pub message_count: u64,
    /// Connected-since, milliseconds since the Unix epoch.
    pub connected: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgeStatsPayload {
    pub server: ServerStats,
    pub connections: ConnectionStats,
    pub messages: MessageStats,
    pub clients: Vec<ClientStats>,
}

// =============================================================================
// META
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AckPayload {
    pub message_id: String,
}

// =============================================================================
// PAYLOAD SUM TYPE
// =============================================================================

/// Typed payload, one variant per [`MessageType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Connect(ConnectPayload),
    Disconnect(DisconnectPayload),
    Ping(EmptyPayload),
    Pong(EmptyPayload),
    FileOpen(FileOpenPayload),
    FileOpened(FileOpenedPayload),
    FileClose(FileClosePayload),
    ProjectOpen(ProjectOpenPayload),
    ProjectSync(ProjectSyncPayload),
    LearningEvent(LearningEventPayload),
    LearningSync(LearningSyncPayload),
    Notification(NotificationPayload),
    GetGitStatus(EmptyPayload),
    GitStatusUpdate(GitStatusPayload),
    CommandRequest(CommandRequestPayload),
    CommandExecute(CommandExecutePayload),
    CommandResult(CommandResultPayload),
    CommandResponse(CommandResponsePayload),
    BridgeStats(Box<BridgeStatsPayload>),
    Error(ErrorPayload),
    Ack(AckPayload),
}

impl Payload {
    /// The discriminant that must accompany this payload on the wire.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Connect(_) => MessageType::Connect,
            Payload::Disconnect(_) => MessageType::Disconnect,
            Payload::Ping(_) => MessageType::Ping,
            Payload::Pong(_) => MessageType::Pong,
            Payload::FileOpen(_) => MessageType::FileOpen,
            Payload::FileOpened(_) => MessageType::FileOpened,
            Payload::FileClose(_) => MessageType::FileClose,
            Payload::ProjectOpen(_) => MessageType::ProjectOpen,
            Payload::ProjectSync(_) => MessageType::ProjectSync,
            Payload::LearningEvent(_) => MessageType::LearningEvent,
            Payload::LearningSync(_) => MessageType::LearningSync,
            Payload::Notification(_) => MessageType::Notification,
            Payload::GetGitStatus(_) => MessageType::GetGitStatus,
            Payload::GitStatusUpdate(_) => MessageType::GitStatusUpdate,
            Payload::CommandRequest(_) => MessageType::CommandRequest,
            Payload::CommandExecute(_) => MessageType::CommandExecute,
            Payload::CommandResult(_) => MessageType::CommandResult,
            Payload::CommandResponse(_) => MessageType::CommandResponse,
            Payload::BridgeStats(_) => MessageType::BridgeStats,
            Payload::Error(_) => MessageType::Error,
            Payload::Ack(_) => MessageType::Ack,
        }
    }

    /// Encode the payload body as a JSON value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Payload::Connect(p) => serde_json::to_value(p),
            Payload::Disconnect(p) => serde_json::to_value(p),
            Payload::Ping(p) | Payload::Pong(p) | Payload::GetGitStatus(p) => {
                serde_json::to_value(p)
            }
            Payload::FileOpen(p) => serde_json::to_value(p),
            Payload::FileOpened(p) => serde_json::to_value(p),
            Payload::FileClose(p) => serde_json::to_value(p),
            Payload::ProjectOpen(p) => serde_json::to_value(p),
            Payload::ProjectSync(p) => serde_json::to_value(p),
            Payload::LearningEvent(p) => serde_json::to_value(p),
            Payload::LearningSync(p) => serde_json::to_value(p),
            Payload::Notification(p) => serde_json::to_value(p),
            Payload::GitStatusUpdate(p) => serde_json::to_value(p),
            Payload::CommandRequest(p) => serde_json::to_value(p),
            Payload::CommandExecute(p) => serde_json::to_value(p),
            Payload::CommandResult(p) => serde_json::to_value(p),
            Payload::CommandResponse(p) => serde_json::to_value(p),
            Payload::BridgeStats(p) => serde_json::to_value(p),
            Payload::Error(p) => serde_json::to_value(p),
            Payload::Ack(p) => serde_json::to_value(p),
        }
    }

    /// Decode a payload body for the given kind.
    pub fn from_value(kind: MessageType, value: Value) -> Result<Self, serde_json::Error> {
        use serde_json::from_value as decode;

        Ok(match kind {
            MessageType::Connect => Payload::Connect(decode(value)?),
            MessageType::Disconnect => Payload::Disconnect(decode(value)?),
            MessageType::Ping => Payload::Ping(decode(value)?),
            MessageType::Pong => Payload::Pong(decode(value)?),
            MessageType::FileOpen => Payload::FileOpen(decode(value)?),
            MessageType::FileOpened => Payload::FileOpened(decode(value)?),
            MessageType::FileClose => Payload::FileClose(decode(value)?),
            MessageType::ProjectOpen => Payload::ProjectOpen(decode(value)?),
            MessageType::ProjectSync => Payload::ProjectSync(decode(value)?),
            MessageType::LearningEvent => Payload::LearningEvent(decode(value)?),
            MessageType::LearningSync => Payload::LearningSync(decode(value)?),
            MessageType::Notification => Payload::Notification(decode(value)?),
            MessageType::GetGitStatus => Payload::GetGitStatus(decode(value)?),
            MessageType::GitStatusUpdate => Payload::GitStatusUpdate(decode(value)?),
            MessageType::CommandRequest => Payload::CommandRequest(decode(value)?),
            MessageType::CommandExecute => Payload::CommandExecute(decode(value)?),
            MessageType::CommandResult => Payload::CommandResult(decode(value)?),
            MessageType::CommandResponse => Payload::CommandResponse(decode(value)?),
            MessageType::BridgeStats => Payload::BridgeStats(Box::new(decode(value)?)),
            MessageType::Error => Payload::Error(decode(value)?),
            MessageType::Ack => Payload::Ack(decode(value)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_open_uses_camel_case() {
        let payload = FileOpenPayload {
            file_path: "src/main.rs".into(),
            line: Some(12),
            ..FileOpenPayload::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({ "filePath": "src/main.rs", "line": 12 }));
    }

    #[test]
    fn test_unknown_payload_field_is_rejected() {
        let err = Payload::from_value(
            MessageType::FileClose,
            json!({ "filePath": "a.rs", "force": true }),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_response_wraps_result() {
        let result = CommandResultPayload::ok("cmd-1", json!({ "lines": 3 }));
        let response = CommandResponsePayload::from_result(result.clone(), Some("client-2".into()));
        assert_eq!(response.target_client_id.as_deref(), Some("client-2"));
        assert_eq!(response.into_result(), result);
    }

    #[test]
    fn test_empty_payload_accepts_empty_object_only() {
        assert!(Payload::from_value(MessageType::Ping, json!({})).is_ok());
        assert!(Payload::from_value(MessageType::Ping, json!({ "x": 1 })).is_err());
    }

    #[test]
    fn test_null_result_survives_the_wire() {
        let result = CommandResultPayload::ok("cmd-1", Value::Null);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["result"], Value::Null);
        assert!(value.as_object().unwrap().contains_key("result"));

        let decoded: CommandResultPayload = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, result);

        let absent: CommandResultPayload =
            serde_json::from_value(json!({ "commandId": "cmd-2", "success": true })).unwrap();
        assert_eq!(absent.result, None);
    }
}
