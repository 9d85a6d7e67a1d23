//! # Bridge Client
//!
//! The peer side of the bus: one [`ConnectionManager`] per process, with a
//! [`CommandHandler`] correlating `command_request`s to the
//! `command_response`s that arrive later on the inbound stream.
//!
//! ```text
//! ┌─────────────────────────────── peer process ───────────────────────────────┐
//! │                                                                           │
//! │  app ── send() ──→ ConnectionManager ── queue (while offline) ──→ FrameSink ──┼──→ hub
//! │   ↑                      │                                                │
//! │   │ subscribe()          │ dispatch                                       │
//! │   │                      ├── command_response ──→ CommandHandler ──→ caller future
//! │   └──────────────────────┴── everything else ──→ broadcast                │
//! │                                                          FrameStream ←────┼─── hub
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Exactly-once settlement:** a pending command is resolved, rejected or
//!   timed out once, and its timer is cancelled on every other path.
//! - **Ordered delivery:** queued messages are flushed in their original order
//!   before any message sent after reconnection.
//! - **No hanging callers:** losing the transport rejects every outstanding
//!   command with a uniform disconnection error.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod pending;
pub mod state;
pub mod transport;

pub use adapters::{MemoryConnector, MemoryHub, MemoryPeer, WsConnector};
pub use config::{ClientConfig, ConfigError, ReconnectPolicy, DEFAULT_MAX_QUEUE_LEN};
pub use connection::{ConnectionManager, SendOutcome};
pub use error::{CommandError, ConnectionError, TransportError};
pub use events::{MessageFilter, Subscription, SubscriptionError};
pub use pending::{CommandHandler, PendingReply, PendingStats};
pub use state::{ConnectionSnapshot, ConnectionStatus};
pub use transport::{Connector, Duplex, FrameSink, FrameStream};
