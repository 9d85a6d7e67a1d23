//! Application-facing event subscriptions.
//!
//! Inbound messages that are not consumed by the connection manager itself
//! (command replies, heartbeats) are broadcast to every subscriber.

use bridge_protocol::{Message, MessageType};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The connection manager was dropped.
    #[error("event channel closed")]
    Closed,
}

/// Selects which message kinds a subscription receives.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    kinds: Option<HashSet<MessageType>>,
}

impl MessageFilter {
    /// Every kind.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the listed kinds.
    pub fn kinds(kinds: impl IntoIterator<Item = MessageType>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
        }
    }

    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        self.kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&message.kind()))
    }
}

/// A stream of inbound messages matching a filter.
pub struct Subscription {
    receiver: broadcast::Receiver<Message>,
    filter: MessageFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<Message>, filter: MessageFilter) -> Self {
        Self { receiver, filter }
    }

    /// Next matching message; `None` once the manager is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some messages dropped");
                    continue;
                }
            };
            if self.filter.matches(&message) {
                return Some(message);
            }
        }
    }

    /// Next matching message without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Message>, SubscriptionError> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };
            if self.filter.matches(&message) {
                return Ok(Some(message));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }
}
