//! # Message Builders
//!
//! The sanctioned way to construct protocol messages. Each builder takes the
//! sender role and a typed payload and returns a complete envelope with a
//! fresh `messageId`, the current timestamp and the default version.

use crate::envelope::Message;
use crate::payloads::*;
use crate::roles::SourceRole;
use std::time::Duration;

pub fn connect(source: SourceRole, payload: ConnectPayload) -> Message {
    Message::new(source, Payload::Connect(payload))
}

pub fn disconnect(source: SourceRole, payload: DisconnectPayload) -> Message {
    Message::new(source, Payload::Disconnect(payload))
}

pub fn ping(source: SourceRole) -> Message {
    Message::new(source, Payload::Ping(EmptyPayload {}))
}

pub fn pong(source: SourceRole) -> Message {
    Message::new(source, Payload::Pong(EmptyPayload {}))
}

pub fn file_open(source: SourceRole, payload: FileOpenPayload) -> Message {
    Message::new(source, Payload::FileOpen(payload))
}

pub fn file_opened(source: SourceRole, payload: FileOpenedPayload) -> Message {
    Message::new(source, Payload::FileOpened(payload))
}

pub fn file_close(source: SourceRole, payload: FileClosePayload) -> Message {
    Message::new(source, Payload::FileClose(payload))
}

pub fn project_open(source: SourceRole, payload: ProjectOpenPayload) -> Message {
    Message::new(source, Payload::ProjectOpen(payload))
}

pub fn project_sync(source: SourceRole, payload: ProjectSyncPayload) -> Message {
    Message::new(source, Payload::ProjectSync(payload))
}

pub fn learning_event(source: SourceRole, payload: LearningEventPayload) -> Message {
    Message::new(source, Payload::LearningEvent(payload))
}

pub fn learning_sync(source: SourceRole, payload: LearningSyncPayload) -> Message {
    Message::new(source, Payload::LearningSync(payload))
}

pub fn notification(source: SourceRole, payload: NotificationPayload) -> Message {
    Message::new(source, Payload::Notification(payload))
}

pub fn get_git_status(source: SourceRole) -> Message {
    Message::new(source, Payload::GetGitStatus(EmptyPayload {}))
}

pub fn git_status_update(source: SourceRole, payload: GitStatusPayload) -> Message {
    Message::new(source, Payload::GitStatusUpdate(payload))
}

/// Stage 1 of the command flow. The returned message's `messageId` is the
/// command id the requester should register for correlation.
pub fn command_request(
    source: SourceRole,
    payload: CommandRequestPayload,
    timeout: Duration,
) -> Message {
    Message::new(source, Payload::CommandRequest(payload)).with_timeout(timeout)
}

pub fn command_execute(source: SourceRole, payload: CommandExecutePayload) -> Message {
    let command_id = payload.command_id.clone();
    Message::new(source, Payload::CommandExecute(payload)).with_correlation_id(command_id)
}

pub fn command_result(source: SourceRole, payload: CommandResultPayload) -> Message {
    let command_id = payload.command_id.clone();
    Message::new(source, Payload::CommandResult(payload)).with_correlation_id(command_id)
}

pub fn command_response(source: SourceRole, payload: CommandResponsePayload) -> Message {
    let command_id = payload.command_id.clone();
    Message::new(source, Payload::CommandResponse(payload)).with_correlation_id(command_id)
}

pub fn bridge_stats(source: SourceRole, payload: BridgeStatsPayload) -> Message {
    Message::new(source, Payload::BridgeStats(Box::new(payload)))
}

pub fn error(source: SourceRole, payload: ErrorPayload) -> Message {
    Message::new(source, Payload::Error(payload))
}

/// Acknowledge `message_id`. Correlated with the acknowledged message.
pub fn ack(source: SourceRole, message_id: impl Into<String>) -> Message {
    let message_id = message_id.into();
    Message::new(
        source,
        Payload::Ack(AckPayload {
            message_id: message_id.clone(),
        }),
    )
    .with_correlation_id(message_id)
}
