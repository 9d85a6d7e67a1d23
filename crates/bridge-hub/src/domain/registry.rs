//! Connected peers.
//!
//! A client exists from socket accept to socket close. Its role is unknown
//! until the first valid frame arrives; until then it receives only direct
//! replies (errors about its own frames), never routed traffic.

use super::error::DeliveryError;
use bridge_protocol::{ClientStats, SourceRole};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Hub-assigned id, `client-<n>`, stable for the connection's lifetime.
pub type ClientId = String;

#[derive(Debug)]
pub struct ClientEntry {
    pub id: ClientId,
    /// Accept order; lower connected earlier.
    pub seq: u64,
    pub role: Option<SourceRole>,
    /// Display name from the peer's `connect` announcement.
    pub name: Option<String>,
    pub message_count: u64,
    /// Connected-since, ms since the Unix epoch.
    pub connected_at: u64,
    outbound: mpsc::Sender<String>,
}

impl ClientEntry {
    pub fn new(seq: u64, connected_at: u64, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id: format!("client-{seq}"),
            seq,
            role: None,
            name: None,
            message_count: 0,
            connected_at,
            outbound,
        }
    }

    /// Queue a frame for the client's writer task. Never blocks.
    pub fn deliver(&self, frame: String) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Gone,
        })
    }

    /// Per-client stats row. `None` until the role is known.
    pub fn stats(&self) -> Option<ClientStats> {
        self.role.map(|source| ClientStats {
            id: self.id.clone(),
            source,
            message_count: self.message_count,
            connected: self.connected_at,
        })
    }
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientEntry>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ClientEntry) {
        self.clients.insert(entry.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientEntry> {
        self.clients.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ClientEntry> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ClientEntry> {
        self.clients.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// All clients in connection order.
    pub fn ordered(&self) -> Vec<&ClientEntry> {
        let mut clients: Vec<&ClientEntry> = self.clients.values().collect();
        clients.sort_by_key(|c| c.seq);
        clients
    }

    /// Clients declared as `role`, in connection order, excluding `except`.
    pub fn with_role(&self, role: SourceRole, except: &str) -> Vec<&ClientEntry> {
        self.ordered()
            .into_iter()
            .filter(|c| c.role == Some(role) && c.id != except)
            .collect()
    }

    /// Every identified client, in connection order.
    pub fn identified(&self) -> Vec<&ClientEntry> {
        self.ordered()
            .into_iter()
            .filter(|c| c.role.is_some())
            .collect()
    }

    /// Every identified client except `except`, in connection order.
    pub fn identified_except(&self, except: &str) -> Vec<&ClientEntry> {
        self.ordered()
            .into_iter()
            .filter(|c| c.role.is_some() && c.id != except)
            .collect()
    }

    /// Number of connections declared as `role`.
    pub fn count_role(&self, role: SourceRole) -> usize {
        self.clients
            .values()
            .filter(|c| c.role == Some(role))
            .count()
    }

    pub fn client_stats(&self) -> Vec<ClientStats> {
        self.ordered()
            .into_iter()
            .filter_map(ClientEntry::stats)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64, role: Option<SourceRole>) -> (ClientEntry, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(2);
        let mut entry = ClientEntry::new(seq, 1_000 + seq, tx);
        entry.role = role;
        (entry, rx)
    }

    #[test]
    fn test_role_lookup_is_ordered_and_excludes_sender() {
        let mut registry = ClientRegistry::new();
        let (a, _ra) = entry(3, Some(SourceRole::Vibe));
        let (b, _rb) = entry(1, Some(SourceRole::Vibe));
        let (c, _rc) = entry(2, Some(SourceRole::Nova));
        registry.insert(a);
        registry.insert(b);
        registry.insert(c);

        let ids: Vec<&str> = registry
            .with_role(SourceRole::Vibe, "client-2")
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["client-1", "client-3"]);

        let ids: Vec<&str> = registry
            .with_role(SourceRole::Vibe, "client-1")
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["client-3"]);
        assert_eq!(registry.count_role(SourceRole::Vibe), 2);
    }

    #[test]
    fn test_unidentified_clients_have_no_stats_row() {
        let mut registry = ClientRegistry::new();
        let (a, _ra) = entry(1, None);
        let (b, _rb) = entry(2, Some(SourceRole::Dashboard));
        registry.insert(a);
        registry.insert(b);

        let rows = registry.client_stats();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "client-2");
        assert_eq!(rows[0].connected, 1_002);
        assert_eq!(registry.identified_except("client-9").len(), 1);
    }

    #[test]
    fn test_deliver_reports_full_and_gone() {
        let (a, mut rx) = entry(1, None);
        assert!(a.deliver("one".into()).is_ok());
        assert!(a.deliver("two".into()).is_ok());
        assert_eq!(a.deliver("three".into()), Err(DeliveryError::Full));

        assert_eq!(rx.try_recv().unwrap(), "one");
        drop(rx);
        assert_eq!(a.deliver("four".into()), Err(DeliveryError::Gone));
    }
}
