//! Command correlation handler.
//!
//! Maps command ids to callers waiting for a `command_response` that will
//! arrive later, out of order, on the inbound stream.
//!
//! Flow:
//! 1. Caller builds a `command_request`; its `messageId` is the command id
//! 2. Caller calls `register_command()` and gets a [`PendingReply`]
//! 3. Caller sends the request
//! 4. Inbound dispatch calls `handle_result()` (or `reject_command()`)
//! 5. Caller awaits the reply, which settles exactly once
//!
//! Every entry owns a timer task. Whichever path removes the entry from the
//! table first settles it and aborts the timer; the others find nothing and
//! do nothing.

use crate::error::CommandError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

type Slot<T> = oneshot::Sender<Result<T, CommandError>>;

/// A registered command awaiting settlement.
struct PendingCommand<T> {
    sender: Slot<T>,
    /// Timeout task; aborted when any other path settles the entry.
    timer: Option<JoinHandle<()>>,
    /// Distinguishes this registration from a later one reusing the id.
    seq: u64,
    created_at: Instant,
}

impl<T> PendingCommand<T> {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Counters for the handler.
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_rejected: AtomicU64,
    /// Registrations refused because the id was still pending.
    pub total_duplicates: AtomicU64,
}

/// Future returned by [`CommandHandler::register_command`].
#[must_use = "a pending reply does nothing unless awaited"]
pub struct PendingReply<T> {
    state: ReplyState<T>,
}

enum ReplyState<T> {
    Waiting(oneshot::Receiver<Result<T, CommandError>>),
    Failed(Option<CommandError>),
}

impl<T> Future for PendingReply<T> {
    type Output = Result<T, CommandError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            ReplyState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                // Sender dropped without a value: the table was cleared.
                Poll::Ready(Err(_)) => Poll::Ready(Err(CommandError::Abandoned)),
                Poll::Pending => Poll::Pending,
            },
            ReplyState::Failed(err) => {
                Poll::Ready(Err(err.take().unwrap_or(CommandError::Abandoned)))
            }
        }
    }
}

/// Per-process table of in-flight commands.
///
/// Cheap to clone; clones share the table.
pub struct CommandHandler<T> {
    pending: Arc<DashMap<String, PendingCommand<T>>>,
    next_seq: Arc<AtomicU64>,
    stats: Arc<PendingStats>,
}

impl<T> Clone for CommandHandler<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            next_seq: Arc::clone(&self.next_seq),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> Default for CommandHandler<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandHandler<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(1)),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register `command_id` and arm its timeout.
    ///
    /// Must be called from within a tokio runtime. If `command_id` is already
    /// pending, the existing entry is left alone and the returned reply fails
    /// immediately with [`CommandError::Duplicate`].
    pub fn register_command(&self, command_id: &str, timeout: Duration) -> PendingReply<T> {
        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        match self.pending.entry(command_id.to_string()) {
            Entry::Occupied(_) => {
                self.stats.total_duplicates.fetch_add(1, Ordering::Relaxed);
                warn!(command_id, "Command id is already pending");
                return PendingReply {
                    state: ReplyState::Failed(Some(CommandError::Duplicate(
                        command_id.to_string(),
                    ))),
                };
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingCommand {
                    sender: tx,
                    timer: None,
                    seq,
                    created_at: Instant::now(),
                });
            }
        }

        let timer = self.spawn_timer(command_id.to_string(), seq, timeout);
        match self.pending.get_mut(command_id) {
            Some(mut entry) if entry.seq == seq => entry.timer = Some(timer),
            // Settled before the timer was attached.
            _ => timer.abort(),
        }

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            command_id,
            timeout_ms = timeout.as_millis() as u64,
            "Registered pending command"
        );

        PendingReply {
            state: ReplyState::Waiting(rx),
        }
    }

    fn spawn_timer(&self, command_id: String, seq: u64, timeout: Duration) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let stats = Arc::clone(&self.stats);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some((_, entry)) = pending.remove_if(&command_id, |_, e| e.seq == seq) {
                stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(command_id = %command_id, timeout_ms, "Pending command timed out");
                let _ = entry.sender.send(Err(CommandError::Timeout { timeout_ms }));
            }
        })
    }

    /// Resolve `command_id` with `result`.
    ///
    /// Returns false if nothing is pending under that id (already settled,
    /// timed out, or never registered).
    pub fn handle_result(&self, command_id: &str, result: T) -> bool {
        let Some((_, mut entry)) = self.pending.remove(command_id) else {
            debug!(command_id, "Result for unknown or settled command ignored");
            return false;
        };
        entry.disarm();
        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            command_id,
            elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
            "Completed pending command"
        );
        if entry.sender.send(Ok(result)).is_err() {
            debug!(command_id, "Caller stopped waiting before the result arrived");
        }
        true
    }

    /// Reject `command_id` with `error`. No-op if it is not pending.
    pub fn reject_command(&self, command_id: &str, error: CommandError) {
        if let Some((_, mut entry)) = self.pending.remove(command_id) {
            entry.disarm();
            self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(command_id, %error, "Rejected pending command");
            let _ = entry.sender.send(Err(error));
        }
    }

    /// Reject every pending command with the same error and empty the table.
    pub fn reject_all(&self, error: CommandError) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut rejected = 0usize;
        for id in ids {
            if let Some((_, mut entry)) = self.pending.remove(&id) {
                entry.disarm();
                let _ = entry.sender.send(Err(error.clone()));
                rejected += 1;
            }
        }
        if rejected > 0 {
            self.stats
                .total_rejected
                .fetch_add(rejected as u64, Ordering::Relaxed);
            warn!(count = rejected, %error, "Rejected all pending commands");
        }
    }

    /// Drop all bookkeeping without settling anything.
    ///
    /// Timers are cancelled. A caller still awaiting its reply observes
    /// [`CommandError::Abandoned`].
    pub fn clear(&self) {
        self.pending.retain(|_, entry| {
            entry.disarm();
            false
        });
        debug!("Cleared pending command table");
    }

    /// Number of commands currently pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, command_id: &str) -> bool {
        self.pending.contains_key(command_id)
    }

    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
