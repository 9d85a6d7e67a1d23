//! # Routing Core
//!
//! Every inbound frame from every connection passes through
//! [`Hub::handle_frame`]. It is decoded, validated, counted and routed while
//! the hub's single state lock is held, so the clients table, the command
//! routes and the statistics always change together.
//!
//! ```text
//! frame ──size──→ JSON ──validate──→ learn role ──count──→ route
//!   │               │        │                               │
//!   └───────────────┴────────┴── error reply (rejected) ─────┤
//!                                                            ├─ ping/pong to hub → answered / consumed
//!                                                            ├─ command_request  → command_execute (executor)
//!                                                            ├─ command_result   → command_response (requester)
//!                                                            ├─ target role      → every client of that role
//!                                                            └─ no target        → every other client
//! ```
//!
//! Delivery never blocks: frames are pushed onto each client's bounded
//! outbound buffer and written by that connection's own task.

use crate::domain::{
    ClientEntry, ClientId, ClientRegistry, CommandRoute, DeliveryError, HubConfig, HubStats,
    RecentMessage, RouteTable,
};
use bridge_protocol::{
    builders, codes, now_ms, validate, BridgeStatsPayload, CommandExecutePayload,
    CommandRequestPayload, CommandResponsePayload, CommandResultPayload, ErrorPayload, Message,
    Payload, SourceRole,
};
use bridge_telemetry::{
    COMMANDS_IN_FLIGHT, COMMAND_DURATION, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS,
    MESSAGES_REJECTED, MESSAGES_ROUTED,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Error text of responses for commands whose executor went away.
pub const EXECUTOR_DISCONNECTED: &str = "executor disconnected";

struct HubState {
    clients: ClientRegistry,
    stats: HubStats,
    routes: RouteTable,
}

/// A newly attached connection: its id and the frames queued for it.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub outbound: mpsc::Receiver<String>,
}

/// The relay hub, independent of any socket.
pub struct Hub {
    config: HubConfig,
    started: Instant,
    port: AtomicU16,
    next_seq: AtomicU64,
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let state = HubState {
            clients: ClientRegistry::new(),
            stats: HubStats::new(config.recent_log_capacity),
            routes: RouteTable::new(),
        };
        Self {
            port: AtomicU16::new(config.port),
            config,
            started: Instant::now(),
            next_seq: AtomicU64::new(1),
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Port reported in `bridge_stats`. Set once the listener is bound.
    pub fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::Relaxed);
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Relaxed)
    }

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// Register a new connection.
    pub fn attach(&self) -> ClientHandle {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer);
        let entry = ClientEntry::new(seq, now_ms(), tx);
        let id = entry.id.clone();
        {
            let mut state = self.state.lock();
            state.clients.insert(entry);
            state.stats.record_connection();
        }
        CONNECTIONS_ACTIVE.inc();
        CONNECTIONS_TOTAL.inc();
        info!(client_id = %id, "Client connected");
        ClientHandle { id, outbound: rx }
    }

    /// Forget a connection. Commands it was executing are answered with a
    /// failed `command_response`; commands it requested are dropped.
    pub fn detach(&self, client_id: &str) {
        let mut state = self.state.lock();
        let Some(client) = state.clients.remove(client_id) else {
            return;
        };
        state.stats.record_disconnection();
        CONNECTIONS_ACTIVE.dec();
        DISCONNECTIONS.inc();

        for route in state.routes.close_for_executor(client_id) {
            COMMANDS_IN_FLIGHT.dec();
            let failed = CommandResultPayload::failed(route.command_id.clone(), EXECUTOR_DISCONNECTED);
            self.respond(&state, &route, failed);
        }
        let orphaned = state.routes.close_for_requester(client_id);
        COMMANDS_IN_FLIGHT.sub(orphaned.len() as i64);

        info!(
            client_id = %client_id,
            role = ?client.role,
            messages = client.message_count,
            orphaned_commands = orphaned.len(),
            "Client disconnected"
        );
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Process one text frame received from `client_id`.
    pub fn handle_frame(&self, client_id: &str, text: &str) {
        let mut state = self.state.lock();
        if state.clients.get(client_id).is_none() {
            debug!(client_id = %client_id, "Frame from detached client ignored");
            return;
        }

        if text.len() > self.config.max_message_size {
            let error = ErrorPayload::new(
                codes::MESSAGE_TOO_LARGE,
                format!(
                    "Message of {} bytes exceeds limit of {} bytes",
                    text.len(),
                    self.config.max_message_size
                ),
            );
            self.reject(&mut state, client_id, None, error);
            return;
        }

        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                let error = ErrorPayload::new(codes::INVALID_JSON, format!("Invalid JSON: {e}"));
                self.reject(&mut state, client_id, None, error);
                return;
            }
        };
        let correlation = raw
            .get("messageId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned);

        let message = match validate(&raw) {
            Ok(message) => message,
            Err(report) => {
                let error = ErrorPayload::new(codes::VALIDATION_FAILED, report.to_string())
                    .with_details(report.to_details());
                self.reject(&mut state, client_id, correlation, error);
                return;
            }
        };

        if message.source == SourceRole::Hub {
            let error = ErrorPayload::new(
                codes::VALIDATION_FAILED,
                "source 'hub' is reserved for the relay",
            )
            .with_details(json!([{ "path": "source", "problem": "reserved role" }]));
            self.reject(&mut state, client_id, correlation, error);
            return;
        }

        if let Some(client) = state.clients.get_mut(client_id) {
            if client.role.is_none() {
                client.role = Some(message.source);
                info!(client_id = %client_id, role = %message.source, "Client identified");
            }
            if let Payload::Connect(connect) = &message.payload {
                client.name = connect.name.clone();
            }
            client.message_count += 1;
        }
        state.stats.record_message(client_id, &message);
        MESSAGES_ROUTED
            .with_label_values(&[message.kind().as_str()])
            .inc();
        debug!(
            client_id = %client_id,
            message_id = %message.message_id,
            kind = %message.kind(),
            target = ?message.target,
            "Routing message"
        );

        let routed = self.route(&mut state, client_id, &message);
        if routed && message.requires_ack() {
            let ack = builders::ack(SourceRole::Hub, message.message_id.clone())
                .with_target(message.source);
            self.send_to(&state, client_id, &ack);
        }
    }

    /// Route an accepted message. False when it was answered with an error.
    fn route(&self, state: &mut HubState, client_id: &str, message: &Message) -> bool {
        let to_hub = matches!(message.target, None | Some(SourceRole::Hub));
        match &message.payload {
            Payload::Ping(_) if to_hub => {
                let pong = builders::pong(SourceRole::Hub)
                    .with_target(message.source)
                    .with_correlation_id(message.message_id.clone());
                self.send_to(state, client_id, &pong);
                true
            }
            Payload::Pong(_) if to_hub => true,
            Payload::CommandRequest(request) => {
                self.route_command_request(state, client_id, message, request)
            }
            Payload::CommandResult(result) => {
                self.route_command_result(state, client_id, message, result)
            }
            _ => match message.target {
                Some(SourceRole::Hub) => {
                    debug!(kind = %message.kind(), "Message addressed to hub consumed");
                    true
                }
                Some(target) => self.deliver_to_role(state, client_id, message, target),
                None => {
                    self.broadcast_from(state, client_id, message);
                    true
                }
            },
        }
    }

    fn deliver_to_role(
        &self,
        state: &HubState,
        client_id: &str,
        message: &Message,
        target: SourceRole,
    ) -> bool {
        let recipients = state.clients.with_role(target, client_id);
        if recipients.is_empty() {
            let error = ErrorPayload::new(
                codes::TARGET_NOT_CONNECTED,
                format!("No client connected as '{target}'"),
            );
            self.reply_error(state, client_id, Some(message.message_id.clone()), error);
            return false;
        }
        if let Some(frame) = encode(message) {
            for client in recipients {
                push(client, frame.clone());
            }
        }
        true
    }

    fn broadcast_from(&self, state: &HubState, client_id: &str, message: &Message) {
        let Some(frame) = encode(message) else {
            return;
        };
        for client in state.clients.identified_except(client_id) {
            push(client, frame.clone());
        }
    }

    // =========================================================================
    // FOUR-STAGE COMMAND FLOW
    // =========================================================================

    /// Stage 1 → 2: pick an executor and hand it a `command_execute`.
    fn route_command_request(
        &self,
        state: &mut HubState,
        client_id: &str,
        message: &Message,
        request: &CommandRequestPayload,
    ) -> bool {
        let command_id = message.message_id.clone();

        let Some((command, args)) = split_command(&request.text) else {
            let error = ErrorPayload::new(codes::VALIDATION_FAILED, "command text names no command")
                .with_details(json!([{ "path": "payload.text", "problem": "no command" }]));
            self.reply_error(state, client_id, Some(command_id), error);
            return false;
        };

        let executor = match request.target.or(message.target) {
            Some(role) => state
                .clients
                .with_role(role, client_id)
                .first()
                .map(|c| (c.id.clone(), role)),
            None => state
                .clients
                .identified_except(client_id)
                .into_iter()
                .find_map(|c| match c.role {
                    Some(role) if role != message.source => Some((c.id.clone(), role)),
                    _ => None,
                }),
        };
        let Some((executor_id, executor_role)) = executor else {
            let error = ErrorPayload::new(
                codes::NO_EXECUTOR,
                format!("No peer available to execute '{command}'"),
            );
            self.reply_error(state, client_id, Some(command_id), error);
            return false;
        };

        let mut execute = builders::command_execute(
            SourceRole::Hub,
            CommandExecutePayload {
                command_id: command_id.clone(),
                command,
                args: (!args.is_empty()).then_some(args),
                text: request.text.clone(),
                original_sender: message.source,
            },
        )
        .with_target(executor_role);
        execute.timeout_ms = message.timeout_ms;

        if !self.send_to(state, &executor_id, &execute) {
            let error = ErrorPayload::new(codes::NO_EXECUTOR, "Executor could not accept the command");
            self.reply_error(state, client_id, Some(command_id), error);
            return false;
        }

        let replaced = state.routes.open(CommandRoute {
            command_id: command_id.clone(),
            requester: client_id.to_string(),
            requester_role: message.source,
            executor: executor_id.clone(),
            opened_at: tokio::time::Instant::now(),
        });
        if replaced.is_none() {
            COMMANDS_IN_FLIGHT.inc();
        } else {
            warn!(command_id = %command_id, "Command id reused while in flight; route replaced");
        }
        debug!(
            command_id = %command_id,
            requester = %client_id,
            executor = %executor_id,
            "Command dispatched"
        );
        true
    }

    /// Stage 3 → 4: hand the executor's result back to the requester.
    fn route_command_result(
        &self,
        state: &mut HubState,
        client_id: &str,
        message: &Message,
        result: &CommandResultPayload,
    ) -> bool {
        let owned = state
            .routes
            .get(&result.command_id)
            .is_some_and(|route| route.executor == client_id);
        let route = if owned {
            state.routes.close(&result.command_id)
        } else {
            None
        };
        let Some(route) = route else {
            let error = ErrorPayload::new(
                codes::UNKNOWN_COMMAND,
                format!("No in-flight command '{}'", result.command_id),
            );
            self.reply_error(state, client_id, Some(message.message_id.clone()), error);
            return false;
        };

        COMMANDS_IN_FLIGHT.dec();
        COMMAND_DURATION.observe(route.opened_at.elapsed().as_secs_f64());
        self.respond(state, &route, result.clone());
        true
    }

    /// Deliver a `command_response` for `route` to its requester.
    fn respond(&self, state: &HubState, route: &CommandRoute, result: CommandResultPayload) {
        let shared_role = state.clients.count_role(route.requester_role) > 1;
        let response = builders::command_response(
            SourceRole::Hub,
            CommandResponsePayload::from_result(
                result,
                shared_role.then(|| route.requester.clone()),
            ),
        )
        .with_target(route.requester_role);

        if !self.send_to(state, &route.requester, &response) {
            debug!(
                command_id = %route.command_id,
                requester = %route.requester,
                "Requester gone; command response dropped"
            );
        }
    }

    // =========================================================================
    // OUTBOUND HELPERS
    // =========================================================================

    /// Count a refused frame and tell its sender why.
    fn reject(
        &self,
        state: &mut HubState,
        client_id: &str,
        correlation: Option<String>,
        error: ErrorPayload,
    ) {
        state.stats.record_rejection();
        self.reply_error(state, client_id, correlation, error);
    }

    fn reply_error(
        &self,
        state: &HubState,
        client_id: &str,
        correlation: Option<String>,
        error: ErrorPayload,
    ) {
        warn!(
            client_id = %client_id,
            code = %error.code,
            message = %error.message,
            "Answering with error"
        );
        MESSAGES_REJECTED.with_label_values(&[error.code.as_str()]).inc();

        let mut reply = builders::error(SourceRole::Hub, error);
        if let Some(role) = state.clients.get(client_id).and_then(|c| c.role) {
            reply = reply.with_target(role);
        }
        if let Some(id) = correlation {
            reply = reply.with_correlation_id(id);
        }
        self.send_to(state, client_id, &reply);
    }

    fn send_to(&self, state: &HubState, client_id: &str, message: &Message) -> bool {
        match (state.clients.get(client_id), encode(message)) {
            (Some(client), Some(frame)) => push(client, frame),
            _ => false,
        }
    }

    // =========================================================================
    // STATISTICS & MAINTENANCE
    // =========================================================================

    /// Current `bridge_stats` payload.
    pub fn stats(&self) -> BridgeStatsPayload {
        let state = self.state.lock();
        state.stats.snapshot(
            self.started.elapsed().as_secs(),
            self.port(),
            state.clients.len() as u64,
            state.clients.client_stats(),
        )
    }

    /// Current stats wrapped in a `bridge_stats` envelope.
    pub fn stats_message(&self) -> Message {
        builders::bridge_stats(SourceRole::Hub, self.stats())
    }

    /// Send `bridge_stats` to every identified client. Returns the number of
    /// clients it was queued for.
    pub fn broadcast_stats(&self) -> usize {
        let message = self.stats_message();
        let Some(frame) = encode(&message) else {
            return 0;
        };
        let state = self.state.lock();
        state
            .clients
            .identified()
            .into_iter()
            .filter(|client| push(client, frame.clone()))
            .count()
    }

    /// Drop command routes older than `route_ttl`.
    pub fn prune_routes(&self) -> usize {
        let pruned = {
            let mut state = self.state.lock();
            state
                .routes
                .prune(self.config.route_ttl, tokio::time::Instant::now())
        };
        COMMANDS_IN_FLIGHT.sub(pruned.len() as i64);
        for route in &pruned {
            debug!(command_id = %route.command_id, "Stale command route pruned");
        }
        pruned.len()
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    pub fn commands_in_flight(&self) -> usize {
        self.state.lock().routes.len()
    }

    /// Recent-message log, oldest first.
    pub fn recent_messages(&self) -> Vec<RecentMessage> {
        self.state.lock().stats.recent().cloned().collect()
    }
}

/// `"/analyze src/lib.rs --deep"` → `("analyze", ["src/lib.rs", "--deep"])`.
fn split_command(text: &str) -> Option<(String, Vec<String>)> {
    let mut tokens = text.split_whitespace();
    let command = tokens.next()?.trim_start_matches('/');
    if command.is_empty() {
        return None;
    }
    Some((command.to_string(), tokens.map(str::to_string).collect()))
}

fn encode(message: &Message) -> Option<String> {
    match message.to_json() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, kind = %message.kind(), "Failed to encode message");
            None
        }
    }
}

fn push(client: &ClientEntry, frame: String) -> bool {
    match client.deliver(frame) {
        Ok(()) => true,
        Err(DeliveryError::Full) => {
            warn!(client_id = %client.id, "Outbound buffer full; frame dropped");
            false
        }
        Err(DeliveryError::Gone) => {
            debug!(client_id = %client.id, "Client writer gone; frame dropped");
            false
        }
    }
}
