//! In-flight command routes.
//!
//! A route is opened when the hub turns a `command_request` into a
//! `command_execute` and closed when the executor's `command_result` comes
//! back, the executor disconnects, or the route outlives its TTL.

use super::registry::ClientId;
use bridge_protocol::SourceRole;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRoute {
    pub command_id: String,
    pub requester: ClientId,
    pub requester_role: SourceRole,
    pub executor: ClientId,
    pub opened_at: Instant,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, CommandRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a route. Returns the route it replaced, if the id was in use.
    pub fn open(&mut self, route: CommandRoute) -> Option<CommandRoute> {
        self.routes.insert(route.command_id.clone(), route)
    }

    /// Close and return the route for `command_id`.
    pub fn close(&mut self, command_id: &str) -> Option<CommandRoute> {
        self.routes.remove(command_id)
    }

    pub fn get(&self, command_id: &str) -> Option<&CommandRoute> {
        self.routes.get(command_id)
    }

    pub fn contains(&self, command_id: &str) -> bool {
        self.routes.contains_key(command_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Close every route whose executor is `client`.
    pub fn close_for_executor(&mut self, client: &str) -> Vec<CommandRoute> {
        self.drain_where(|r| r.executor == client)
    }

    /// Close every route requested by `client`; nobody is left to answer.
    pub fn close_for_requester(&mut self, client: &str) -> Vec<CommandRoute> {
        self.drain_where(|r| r.requester == client)
    }

    /// Close every route opened more than `ttl` before `now`.
    pub fn prune(&mut self, ttl: Duration, now: Instant) -> Vec<CommandRoute> {
        self.drain_where(|r| now.saturating_duration_since(r.opened_at) > ttl)
    }

    fn drain_where(&mut self, pred: impl Fn(&CommandRoute) -> bool) -> Vec<CommandRoute> {
        let ids: Vec<String> = self
            .routes
            .values()
            .filter(|r| pred(r))
            .map(|r| r.command_id.clone())
            .collect();
        ids.iter().filter_map(|id| self.routes.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, requester: &str, executor: &str) -> CommandRoute {
        CommandRoute {
            command_id: id.into(),
            requester: requester.into(),
            requester_role: SourceRole::Nova,
            executor: executor.into(),
            opened_at: Instant::now(),
        }
    }

    #[test]
    fn test_open_and_close() {
        let mut table = RouteTable::new();
        assert!(table.open(route("cmd-1", "client-1", "client-2")).is_none());
        assert!(table.contains("cmd-1"));

        let closed = table.close("cmd-1").unwrap();
        assert_eq!(closed.executor, "client-2");
        assert!(table.close("cmd-1").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_close_for_executor_leaves_other_routes() {
        let mut table = RouteTable::new();
        table.open(route("cmd-1", "client-1", "client-2"));
        table.open(route("cmd-2", "client-1", "client-3"));
        table.open(route("cmd-3", "client-3", "client-2"));

        let mut closed: Vec<String> = table
            .close_for_executor("client-2")
            .into_iter()
            .map(|r| r.command_id)
            .collect();
        closed.sort();
        assert_eq!(closed, vec!["cmd-1", "cmd-3"]);
        assert_eq!(table.len(), 1);

        assert_eq!(table.close_for_requester("client-1").len(), 1);
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_by_age() {
        let mut table = RouteTable::new();
        table.open(route("old", "client-1", "client-2"));
        tokio::time::advance(Duration::from_secs(10)).await;
        table.open(route("new", "client-1", "client-2"));

        let pruned = table.prune(Duration::from_secs(5), Instant::now());
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].command_id, "old");
        assert!(table.contains("new"));
    }
}
