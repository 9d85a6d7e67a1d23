//! Cumulative routing statistics.
//!
//! Held inside the hub's state lock, so every counter touched while
//! processing one frame moves together and a stats snapshot never observes
//! a half-applied update.

use bridge_protocol::{
    BridgeStatsPayload, ClientStats, ConnectionStats, Message, MessageStats, MessageType,
    ServerStats, SourceRole,
};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// One entry of the recent-message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentMessage {
    pub message_id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub source: SourceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<SourceRole>,
    pub client_id: String,
    pub timestamp: u64,
}

#[derive(Debug)]
pub struct HubStats {
    total_connections: u64,
    disconnections: u64,
    total_messages: u64,
    rejected: u64,
    by_type: BTreeMap<String, u64>,
    recent: VecDeque<RecentMessage>,
    recent_capacity: usize,
}

impl HubStats {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            total_connections: 0,
            disconnections: 0,
            total_messages: 0,
            rejected: 0,
            by_type: BTreeMap::new(),
            recent: VecDeque::with_capacity(recent_capacity),
            recent_capacity,
        }
    }

    pub fn record_connection(&mut self) {
        self.total_connections += 1;
    }

    pub fn record_disconnection(&mut self) {
        self.disconnections += 1;
    }

    /// Count an accepted frame and append it to the recent log.
    pub fn record_message(&mut self, client_id: &str, message: &Message) {
        self.total_messages += 1;
        *self
            .by_type
            .entry(message.kind().as_str().to_string())
            .or_insert(0) += 1;

        if self.recent.len() == self.recent_capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(RecentMessage {
            message_id: message.message_id.clone(),
            kind: message.kind(),
            source: message.source,
            target: message.target,
            client_id: client_id.to_string(),
            timestamp: message.timestamp,
        });
    }

    /// Count a frame refused before routing.
    pub fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn count_for(&self, kind: MessageType) -> u64 {
        self.by_type.get(kind.as_str()).copied().unwrap_or(0)
    }

    /// Oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &RecentMessage> {
        self.recent.iter()
    }

    /// Assemble the `bridge_stats` payload.
    pub fn snapshot(
        &self,
        uptime_secs: u64,
        port: u16,
        active: u64,
        clients: Vec<ClientStats>,
    ) -> BridgeStatsPayload {
        BridgeStatsPayload {
            server: ServerStats {
                uptime: uptime_secs,
                port,
            },
            connections: ConnectionStats {
                active,
                total: self.total_connections,
                disconnections: self.disconnections,
            },
            messages: MessageStats {
                total: self.total_messages,
                by_type: self.by_type.clone(),
                recent_count: self.recent.len() as u64,
                rejected: self.rejected,
            },
            clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_protocol::builders;

    #[test]
    fn test_recent_log_is_bounded() {
        let mut stats = HubStats::new(3);
        let pings: Vec<Message> = (0..5).map(|_| builders::ping(SourceRole::Vibe)).collect();
        for ping in &pings {
            stats.record_message("client-1", ping);
        }

        let ids: Vec<&str> = stats.recent().map(|r| r.message_id.as_str()).collect();
        let expected: Vec<&str> = pings[2..].iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, expected);
        assert_eq!(stats.total_messages(), 5);
        assert_eq!(stats.count_for(MessageType::Ping), 5);
    }

    #[test]
    fn test_snapshot_counters() {
        let mut stats = HubStats::new(10);
        stats.record_connection();
        stats.record_connection();
        stats.record_disconnection();
        stats.record_rejection();
        stats.record_message("client-2", &builders::pong(SourceRole::Nova));

        let payload = stats.snapshot(42, 5004, 1, Vec::new());
        assert_eq!(payload.server.uptime, 42);
        assert_eq!(payload.connections.total, 2);
        assert_eq!(payload.connections.disconnections, 1);
        assert_eq!(payload.messages.total, 1);
        assert_eq!(payload.messages.rejected, 1);
        assert_eq!(payload.messages.recent_count, 1);
        assert_eq!(payload.messages.by_type.get("pong"), Some(&1));
    }
}
