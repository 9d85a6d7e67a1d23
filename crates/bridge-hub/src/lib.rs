//! # Bridge Hub
//!
//! The relay between desktop peers. Every peer keeps one WebSocket to the
//! hub; the hub learns each connection's role from its first valid frame
//! and routes envelopes between roles.
//!
//! ```text
//! ┌──────────────────────────────── RELAY HUB ─────────────────────────────────┐
//! │                                                                           │
//! │   peer ──ws──→ handle_socket ──frame──→ Hub::handle_frame                  │
//! │                     ↑                        │                             │
//! │                     │ outbound buffer        ├── validate / reject         │
//! │                     │ (one per client)       ├── stats + recent log        │
//! │                     └────────────────────────┴── route (direct, role, all) │
//! │                                                                           │
//! │   GET /health  /stats  /metrics          maintenance: bridge_stats, prune │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bridge_hub::{HubConfig, HubServer};
//!
//! let server = HubServer::new(HubConfig::default())?;
//! let listener = server.bind().await?;
//! server.run(listener, shutdown_signal()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod router;
pub mod service;
pub mod ws;

pub use domain::config::HubConfig;
pub use domain::error::{HubError, HubResult};
pub use domain::stats::RecentMessage;
pub use router::{ClientHandle, Hub, EXECUTOR_DISCONNECTED};
pub use service::HubServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
