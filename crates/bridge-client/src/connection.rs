//! # Connection Manager
//!
//! Owns the one logical hub connection of a process.
//!
//! ```text
//!              connect()                 transport open + queue flushed
//! Disconnected ────────→ Connecting ───────────────────────────────→ Connected
//!      ↑                   │    ↑                                     │
//!      │ disconnect()      │fail│ retry (ReconnectPolicy)             │ transport lost
//!      │                   ↓    │                                     ↓
//!      └─────────────────── Error ←───────────────────────────────────┘
//! ```
//!
//! While not connected, [`ConnectionManager::send`] appends to a bounded FIFO
//! queue. The queue is flushed in order, under the sink lock, before the
//! status flips to `Connected`, so a message sent after the flip can never
//! overtake a queued one.
//!
//! Every transport gets a generation number. Background tasks (reader,
//! heartbeat, retry) carry the generation they were started for and ignore
//! their own events once it is stale.

use crate::config::{ClientConfig, ConfigError};
use crate::error::{CommandError, ConnectionError, TransportError};
use crate::events::{MessageFilter, Subscription};
use crate::pending::CommandHandler;
use crate::state::{ConnectionSnapshot, ConnectionStatus};
use crate::transport::{Connector, FrameSink, FrameStream};
use bridge_protocol::{
    builders, check_message, parse_frame, CommandExecutePayload, CommandRequestPayload,
    CommandResultPayload, ConnectPayload, DisconnectPayload, Message, Payload, ProtocolError,
    SourceRole,
};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of [`ConnectionManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the live transport.
    Sent,
    /// Held in the outbound queue until the next successful connect.
    Queued,
}

/// Mutable connection state. Guarded by one lock; never held across `.await`.
struct ManagerState {
    status: ConnectionStatus,
    generation: u64,
    queue: VecDeque<Message>,
    last_pong: Option<Instant>,
    last_error: Option<String>,
    reconnect_attempts: u32,
    dropped_messages: u64,
    /// Cleared by `disconnect()`, set by `connect()`.
    auto_reconnect: bool,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl ManagerState {
    fn stop_tasks(&mut self) {
        for task in [self.reader.take(), self.heartbeat.take(), self.retry.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            last_pong: self.last_pong,
            queued: self.queue.len(),
            last_error: self.last_error.clone(),
            reconnect_attempts: self.reconnect_attempts,
            dropped_messages: self.dropped_messages,
        }
    }
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    commands: CommandHandler<CommandResultPayload>,
    state: Mutex<ManagerState>,
    /// Live write half. Held across the flush so that sends queue behind it.
    sink: tokio::sync::Mutex<Option<Box<dyn FrameSink>>>,
    status_tx: watch::Sender<ConnectionSnapshot>,
    events: broadcast::Sender<Message>,
}

/// Handle to the process-wide hub connection.
///
/// Construct once at start-up and pass clones to consumers. Background tasks
/// keep the connection alive until [`disconnect`](Self::disconnect).
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (status_tx, _) = watch::channel(ConnectionSnapshot::default());
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                connector,
                commands: CommandHandler::new(),
                state: Mutex::new(ManagerState {
                    status: ConnectionStatus::Disconnected,
                    generation: 0,
                    queue: VecDeque::new(),
                    last_pong: None,
                    last_error: None,
                    reconnect_attempts: 0,
                    dropped_messages: 0,
                    auto_reconnect: true,
                    reader: None,
                    heartbeat: None,
                    retry: None,
                }),
                sink: tokio::sync::Mutex::new(None),
                status_tx,
                events,
            }),
        })
    }

    /// Manager using the WebSocket transport.
    pub fn websocket(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::new(config, Arc::new(crate::adapters::WsConnector))
    }

    #[must_use]
    pub fn role(&self) -> SourceRole {
        self.inner.config.role
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The correlation handler fed by inbound `command_response`s.
    #[must_use]
    pub fn commands(&self) -> &CommandHandler<CommandResultPayload> {
        &self.inner.commands
    }

    /// Tear down any existing transport and open a new one.
    ///
    /// Manual and automatic reconnects both go through here. Re-enables
    /// automatic reconnect after a [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.inner.state.lock().auto_reconnect = true;
        self.inner.open().await
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        self.inner.close("disconnected by client").await;
    }

    /// Send `message`, or queue it while not connected.
    ///
    /// The message is self-checked first; an invalid message is never queued
    /// or sent.
    pub async fn send(&self, message: Message) -> Result<SendOutcome, ConnectionError> {
        check_message(&message).map_err(ProtocolError::from)?;
        self.inner.send(message).await
    }

    /// Run `text` on another peer through the hub and wait for its result.
    ///
    /// `timeout` defaults to the configured command timeout. The result is
    /// returned whether or not the executor reported success.
    pub async fn request_command(
        &self,
        text: impl Into<String>,
        target: Option<SourceRole>,
        timeout: Option<Duration>,
    ) -> Result<CommandResultPayload, CommandError> {
        let timeout = timeout.unwrap_or(self.inner.config.command_timeout);
        let message = builders::command_request(
            self.role(),
            CommandRequestPayload {
                text: text.into(),
                target,
                ..CommandRequestPayload::default()
            },
            timeout,
        );
        let command_id = message.message_id.clone();
        let reply = self.inner.commands.register_command(&command_id, timeout);

        if let Err(e) = self.send(message).await {
            self.inner
                .commands
                .reject_command(&command_id, CommandError::Rejected(e.to_string()));
        }
        reply.await
    }

    /// Report the outcome of a `command_execute` this peer received.
    pub async fn respond_to(
        &self,
        execute: &CommandExecutePayload,
        outcome: Result<Value, String>,
    ) -> Result<SendOutcome, ConnectionError> {
        let payload = match outcome {
            Ok(result) => CommandResultPayload::ok(execute.command_id.clone(), result),
            Err(error) => CommandResultPayload::failed(execute.command_id.clone(), error),
        };
        self.send(builders::command_result(self.role(), payload)).await
    }

    /// Subscribe to inbound application messages.
    pub fn subscribe(&self, filter: MessageFilter) -> Subscription {
        Subscription::new(self.inner.events.subscribe(), filter)
    }

    /// Observable status for UI collaborators.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.inner.status_tx.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.state.lock().snapshot()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    /// Discard everything in the outbound queue, returning it in order.
    pub fn drain_queue(&self) -> Vec<Message> {
        let mut state = self.inner.state.lock();
        let drained: Vec<Message> = state.queue.drain(..).collect();
        self.inner.publish(&state);
        drained
    }
}

impl Inner {
    fn publish(&self, state: &ManagerState) {
        self.status_tx.send_replace(state.snapshot());
    }

    fn enqueue(&self, state: &mut ManagerState, message: Message) {
        if state.queue.len() >= self.config.max_queue_len {
            if let Some(dropped) = state.queue.pop_front() {
                state.dropped_messages += 1;
                warn!(
                    message_id = %dropped.message_id,
                    kind = %dropped.kind(),
                    max = self.config.max_queue_len,
                    "Outbound queue full, dropping oldest message"
                );
            }
        }
        state.queue.push_back(message);
        self.publish(state);
    }

    async fn send(self: &Arc<Self>, message: Message) -> Result<SendOutcome, ConnectionError> {
        let frame = message.to_json()?;

        let generation = {
            let mut state = self.state.lock();
            if state.status != ConnectionStatus::Connected {
                debug!(kind = %message.kind(), status = %state.status, "Queueing outbound message");
                self.enqueue(&mut state, message);
                return Ok(SendOutcome::Queued);
            }
            state.generation
        };

        let mut sink = self.sink.lock().await;
        let live = {
            let state = self.state.lock();
            state.generation == generation && state.status == ConnectionStatus::Connected
        };
        let result = match sink.as_mut() {
            Some(sink) if live => sink.send_text(frame).await,
            _ => Err(TransportError::Closed),
        };
        drop(sink);

        match result {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(e) => {
                if live {
                    self.transport_lost(generation, format!("send failed: {e}"));
                }
                let mut state = self.state.lock();
                self.enqueue(&mut state, message);
                Ok(SendOutcome::Queued)
            }
        }
    }

    /// Write a frame on the current transport only if it is still `generation`.
    async fn send_live(self: &Arc<Self>, generation: u64, message: Message) -> bool {
        let Ok(frame) = message.to_json() else {
            return false;
        };
        let mut sink = self.sink.lock().await;
        if self.state.lock().generation != generation {
            return false;
        }
        let Some(live) = sink.as_mut() else {
            return false;
        };
        match live.send_text(frame).await {
            Ok(()) => true,
            Err(e) => {
                drop(sink);
                self.transport_lost(generation, format!("send failed: {e}"));
                false
            }
        }
    }

    async fn open(self: &Arc<Self>) -> Result<(), ConnectionError> {
        let (generation, had_live) = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.stop_tasks();
            let had_live = state.status == ConnectionStatus::Connected;
            state.status = ConnectionStatus::Connecting;
            self.publish(&state);
            (state.generation, had_live)
        };
        if had_live {
            self.commands
                .reject_all(CommandError::Disconnected("reconnecting".into()));
        }
        if let Some(mut old) = self.sink.lock().await.take() {
            let _ = old.close().await;
        }

        info!(url = %self.config.url, role = %self.config.role, "Connecting to hub");
        match self.connector.connect(&self.config.url).await {
            Ok((sink, stream)) => {
                let reader = tokio::spawn(read_loop(Arc::clone(self), generation, stream));
                {
                    let mut state = self.state.lock();
                    if state.generation != generation {
                        reader.abort();
                        return Err(ConnectionError::Superseded);
                    }
                    state.reader = Some(reader);
                }
                self.finish_open(generation, sink).await
            }
            Err(e) => {
                self.connect_failed(generation, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Announce, flush the queue, then flip to `Connected`.
    async fn finish_open(
        self: &Arc<Self>,
        generation: u64,
        mut sink: Box<dyn FrameSink>,
    ) -> Result<(), ConnectionError> {
        let mut slot = self.sink.lock().await;

        let announce = builders::connect(
            self.config.role,
            ConnectPayload {
                name: self.config.name.clone(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                capabilities: (!self.config.capabilities.is_empty())
                    .then(|| self.config.capabilities.clone()),
            },
        );
        let frame = announce.to_json()?;
        if let Err(e) = sink.send_text(frame).await {
            drop(slot);
            self.transport_lost(generation, format!("announce failed: {e}"));
            return Err(e.into());
        }

        let mut flushed = 0usize;
        loop {
            let next = {
                let mut state = self.state.lock();
                if state.generation != generation {
                    return Err(ConnectionError::Superseded);
                }
                match state.queue.pop_front() {
                    Some(message) => message,
                    None => {
                        state.status = ConnectionStatus::Connected;
                        state.reconnect_attempts = 0;
                        state.last_error = None;
                        state.heartbeat = Some(tokio::spawn(heartbeat_loop(
                            Arc::clone(self),
                            generation,
                            self.config.heartbeat_interval,
                        )));
                        self.publish(&state);
                        break;
                    }
                }
            };

            let frame = match next.to_json() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(message_id = %next.message_id, error = %e, "Dropping unencodable queued message");
                    continue;
                }
            };
            if let Err(e) = sink.send_text(frame).await {
                self.state.lock().queue.push_front(next);
                drop(slot);
                self.transport_lost(generation, format!("flush failed: {e}"));
                return Err(e.into());
            }
            flushed += 1;
        }

        *slot = Some(sink);
        info!(url = %self.config.url, flushed, "Connected to hub");
        Ok(())
    }

    fn connect_failed(self: &Arc<Self>, generation: u64, reason: String) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        warn!(url = %self.config.url, error = %reason, "Connection attempt failed");
        state.status = ConnectionStatus::Error;
        state.last_error = Some(reason);
        self.schedule_retry(&mut state);
        self.publish(&state);
    }

    /// The live transport of `generation` is gone.
    fn transport_lost(self: &Arc<Self>, generation: u64, reason: String) {
        let was_connected = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            let was_connected = state.status == ConnectionStatus::Connected;
            // Stale reader/heartbeat events are ignored from here on.
            state.generation += 1;
            state.stop_tasks();
            state.status = ConnectionStatus::Error;
            state.last_error = Some(reason.clone());
            self.schedule_retry(&mut state);
            self.publish(&state);
            was_connected
        };

        warn!(error = %reason, "Lost connection to hub");
        if was_connected {
            self.commands.reject_all(CommandError::Disconnected(reason));
        }
    }

    fn schedule_retry(self: &Arc<Self>, state: &mut ManagerState) {
        if !state.auto_reconnect {
            return;
        }
        state.reconnect_attempts += 1;
        let Some(delay) = self.config.reconnect.delay_for(state.reconnect_attempts) else {
            warn!(
                attempts = state.reconnect_attempts,
                "Giving up on automatic reconnect"
            );
            return;
        };
        debug!(
            attempt = state.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        state.retry = Some(tokio::spawn(retry_after(
            Arc::clone(self),
            state.generation,
            delay,
        )));
    }

    async fn close(self: &Arc<Self>, reason: &str) {
        let was_connected = {
            let mut state = self.state.lock();
            state.auto_reconnect = false;
            state.generation += 1;
            state.stop_tasks();
            let was_connected = state.status == ConnectionStatus::Connected;
            state.status = ConnectionStatus::Disconnected;
            self.publish(&state);
            was_connected
        };
        if was_connected {
            self.commands
                .reject_all(CommandError::Disconnected(reason.to_string()));
        }

        let mut slot = self.sink.lock().await;
        if let Some(mut sink) = slot.take() {
            if was_connected {
                let farewell = builders::disconnect(
                    self.config.role,
                    DisconnectPayload {
                        reason: Some(reason.to_string()),
                    },
                );
                if let Ok(frame) = farewell.to_json() {
                    let _ = sink.send_text(frame).await;
                }
            }
            let _ = sink.close().await;
        }
        info!(reason, "Disconnected from hub");
    }

    async fn dispatch(self: &Arc<Self>, generation: u64, text: &str) {
        let message = match parse_frame(text) {
            Ok(message) => message,
            Err(report) => {
                warn!(%report, "Dropping invalid frame from hub");
                return;
            }
        };

        match &message.payload {
            Payload::CommandResponse(response) => {
                let command_id = response.command_id.clone();
                let result = response.clone().into_result();
                if !self.commands.handle_result(&command_id, result) {
                    debug!(command_id = %command_id, "Late or unknown command response");
                }
            }
            Payload::Error(error) => {
                let pending = message
                    .correlation_id
                    .as_deref()
                    .filter(|id| self.commands.is_pending(id));
                match pending {
                    Some(command_id) => {
                        self.commands
                            .reject_command(command_id, CommandError::from(error.clone()));
                    }
                    None => {
                        warn!(code = %error.code, message = %error.message, "Hub reported an error");
                        self.emit(message);
                    }
                }
            }
            Payload::Pong(_) => {
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.last_pong = Some(Instant::now());
                    self.publish(&state);
                }
            }
            Payload::Ping(_) => {
                let pong = builders::pong(self.config.role)
                    .with_target(message.source)
                    .with_correlation_id(message.message_id.clone());
                self.send_live(generation, pong).await;
            }
            _ => self.emit(message),
        }
    }

    fn emit(&self, message: Message) {
        // No subscribers is fine.
        let _ = self.events.send(message);
    }
}

async fn read_loop(inner: Arc<Inner>, generation: u64, mut stream: Box<dyn FrameStream>) {
    loop {
        match stream.next_frame().await {
            Some(Ok(text)) => inner.dispatch(generation, &text).await,
            Some(Err(e)) => {
                inner.transport_lost(generation, e.to_string());
                return;
            }
            None => {
                inner.transport_lost(generation, "connection closed by hub".into());
                return;
            }
        }
    }
}

async fn heartbeat_loop(inner: Arc<Inner>, generation: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let ping = builders::ping(inner.config.role).with_target(SourceRole::Hub);
        if !inner.send_live(generation, ping).await {
            return;
        }
    }
}

// Boxed so that `open` -> `schedule_retry` -> `open` has a nameable type.
fn retry_after(inner: Arc<Inner>, generation: u64, delay: Duration) -> BoxFuture<'static, ()> {
    async move {
        tokio::time::sleep(delay).await;
        {
            let mut state = inner.state.lock();
            if state.generation != generation || !state.auto_reconnect {
                return;
            }
            // Detach ourselves so `open` does not abort this task.
            state.retry = None;
        }
        if let Err(e) = inner.open().await {
            debug!(error = %e, "Reconnect attempt failed");
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryConnector, MemoryHub, MemoryPeer};
    use crate::config::ReconnectPolicy;
    use bridge_protocol::{
        CommandResponsePayload, ErrorPayload, FileClosePayload, MessageType,
    };
    use serde_json::json;

    fn manager(policy: ReconnectPolicy) -> (ConnectionManager, MemoryConnector, MemoryHub) {
        let (connector, hub) = MemoryConnector::new();
        let mut config = ClientConfig::for_role(SourceRole::Vibe);
        config.reconnect = policy;
        config.max_queue_len = 3;
        let manager = ConnectionManager::new(config, Arc::new(connector.clone())).unwrap();
        (manager, connector, hub)
    }

    async fn next_message(peer: &mut MemoryPeer) -> Message {
        let frame = peer.recv().await.expect("client hung up");
        parse_frame(&frame).unwrap()
    }

    fn file_close(path: &str) -> Message {
        builders::file_close(
            SourceRole::Vibe,
            FileClosePayload {
                file_path: path.into(),
            },
        )
    }

    #[tokio::test]
    async fn test_connect_announces_role() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();

        let hello = next_message(&mut peer).await;
        assert_eq!(hello.kind(), MessageType::Connect);
        assert_eq!(hello.source, SourceRole::Vibe);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_queue_flushes_in_order_on_connect() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());

        for path in ["a.rs", "b.rs"] {
            let outcome = manager.send(file_close(path)).await.unwrap();
            assert_eq!(outcome, SendOutcome::Queued);
        }
        assert_eq!(manager.snapshot().queued, 2);

        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();

        assert_eq!(next_message(&mut peer).await.kind(), MessageType::Connect);
        for expected in ["a.rs", "b.rs"] {
            match next_message(&mut peer).await.payload {
                Payload::FileClose(p) => assert_eq!(p.file_path, expected),
                other => panic!("unexpected payload {other:?}"),
            }
        }
        assert_eq!(manager.snapshot().queued, 0);
        assert_eq!(
            manager.send(file_close("c.rs")).await.unwrap(),
            SendOutcome::Sent
        );
    }

    #[tokio::test]
    async fn test_queue_overflow_drops_oldest() {
        let (manager, _connector, _hub) = manager(ReconnectPolicy::disabled());
        for path in ["1", "2", "3", "4"] {
            manager.send(file_close(path)).await.unwrap();
        }
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.queued, 3);
        assert_eq!(snapshot.dropped_messages, 1);

        let remaining: Vec<String> = manager
            .drain_queue()
            .into_iter()
            .filter_map(|m| match m.payload {
                Payload::FileClose(p) => Some(p.file_path),
                _ => None,
            })
            .collect();
        assert_eq!(remaining, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_invalid_message_is_never_queued() {
        let (manager, _connector, _hub) = manager(ReconnectPolicy::disabled());
        let result = manager.send(file_close("")).await;
        assert!(matches!(result, Err(ConnectionError::Protocol(_))));
        assert_eq!(manager.snapshot().queued, 0);
    }

    #[tokio::test]
    async fn test_request_command_resolves_from_response() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        let requester = manager.clone();
        let call = tokio::spawn(async move {
            requester
                .request_command("analyze_code src/lib.rs", Some(SourceRole::Nova), None)
                .await
        });

        let request = next_message(&mut peer).await;
        assert_eq!(request.kind(), MessageType::CommandRequest);
        assert!(request.timeout_ms.is_some());

        let response = builders::command_response(
            SourceRole::Hub,
            CommandResponsePayload::from_result(
                CommandResultPayload::ok(request.message_id.clone(), json!({ "issues": 0 })),
                None,
            ),
        );
        assert!(peer.send(response.to_json().unwrap()));

        let result = call.await.unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.result, Some(json!({ "issues": 0 })));
        assert_eq!(manager.commands().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_correlated_error_rejects_command() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        let requester = manager.clone();
        let call = tokio::spawn(async move { requester.request_command("status", None, None).await });

        let request = next_message(&mut peer).await;
        let error = builders::error(
            SourceRole::Hub,
            ErrorPayload::new("NO_EXECUTOR", "no peer can run this command"),
        )
        .with_correlation_id(request.message_id);
        peer.send(error.to_json().unwrap());

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, CommandError::Remote { ref code, .. } if code == "NO_EXECUTOR"));
    }

    #[tokio::test]
    async fn test_transport_loss_rejects_pending_commands() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        let requester = manager.clone();
        let call = tokio::spawn(async move { requester.request_command("status", None, None).await });
        next_message(&mut peer).await;

        let mut status = manager.watch_status();
        peer.close();
        status
            .wait_for(|s| s.status == ConnectionStatus::Error)
            .await
            .unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, CommandError::Disconnected(_)));
        assert_eq!(
            manager.snapshot().last_error.as_deref(),
            Some("connection closed by hub")
        );
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        let mut sub = manager.subscribe(MessageFilter::kinds([MessageType::FileClose]));
        manager.connect().await.unwrap();
        let peer = hub.accept().await.unwrap();

        peer.send(builders::ping(SourceRole::Hub).to_json().unwrap());
        peer.send(
            builders::file_close(
                SourceRole::Nova,
                FileClosePayload {
                    file_path: "x.rs".into(),
                },
            )
            .to_json()
            .unwrap(),
        );

        let message = sub.recv().await.unwrap();
        assert_eq!(message.source, SourceRole::Nova);
    }

    #[tokio::test]
    async fn test_hub_ping_is_answered() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        let ping = builders::ping(SourceRole::Hub);
        peer.send(ping.to_json().unwrap());

        let pong = next_message(&mut peer).await;
        assert_eq!(pong.kind(), MessageType::Pong);
        assert_eq!(pong.correlation_id.as_deref(), Some(ping.message_id.as_str()));
    }

    #[tokio::test]
    async fn test_pong_updates_last_pong() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let peer = hub.accept().await.unwrap();
        assert!(manager.snapshot().last_pong.is_none());

        let mut status = manager.watch_status();
        peer.send(builders::pong(SourceRole::Hub).to_json().unwrap());
        status.wait_for(|s| s.last_pong.is_some()).await.unwrap();

        assert!(manager.snapshot().since_last_pong().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_sends_ping() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        // Paused clock auto-advances to the first heartbeat tick.
        let ping = next_message(&mut peer).await;
        assert_eq!(ping.kind(), MessageType::Ping);
        assert_eq!(ping.target, Some(SourceRole::Hub));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_schedules_retry() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            ..ReconnectPolicy::default()
        };
        let (manager, connector, mut hub) = manager(policy);
        connector.set_refuse(true);

        assert!(manager.connect().await.is_err());
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Error);
        assert_eq!(snapshot.reconnect_attempts, 1);
        assert!(snapshot.last_error.is_some());

        connector.set_refuse(false);
        let mut status = manager.watch_status();
        status.wait_for(|s| s.is_connected()).await.unwrap();

        assert!(hub.accept().await.is_some());
        assert_eq!(manager.snapshot().reconnect_attempts, 0);
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_stops_reconnect() {
        let (manager, connector, mut hub) = manager(ReconnectPolicy::default());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        manager.disconnect().await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);

        let farewell = next_message(&mut peer).await;
        assert_eq!(farewell.kind(), MessageType::Disconnect);
        assert!(peer.recv().await.is_none());
        assert_eq!(connector.attempts(), 1);

        assert_eq!(
            manager.send(file_close("later.rs")).await.unwrap(),
            SendOutcome::Queued
        );
    }

    #[tokio::test]
    async fn test_disconnect_rejects_pending_commands() {
        let (manager, _connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut peer = hub.accept().await.unwrap();
        next_message(&mut peer).await;

        let requester = manager.clone();
        let call = tokio::spawn(async move { requester.request_command("status", None, None).await });
        next_message(&mut peer).await;
        assert_eq!(manager.commands().pending_count(), 1);

        manager.disconnect().await;

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err, CommandError::Disconnected("disconnected by client".into()));
        assert_eq!(manager.commands().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_while_connected_rejects_pending_commands() {
        let (manager, connector, mut hub) = manager(ReconnectPolicy::disabled());
        manager.connect().await.unwrap();
        let mut first = hub.accept().await.unwrap();
        next_message(&mut first).await;

        let requester = manager.clone();
        let call = tokio::spawn(async move { requester.request_command("status", None, None).await });
        next_message(&mut first).await;

        manager.connect().await.unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, CommandError::Disconnected(ref reason) if reason == "reconnecting"));
        assert_eq!(manager.commands().pending_count(), 0);

        let mut second = hub.accept().await.unwrap();
        assert_eq!(next_message(&mut second).await.kind(), MessageType::Connect);
        assert_eq!(manager.status(), ConnectionStatus::Connected);
        assert_eq!(connector.attempts(), 2);
    }
}
