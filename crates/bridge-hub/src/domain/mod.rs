//! Domain types for the relay hub.
//!
//! Plain data and bookkeeping; no sockets. The [`crate::router::Hub`] owns
//! one of each behind a single lock.

pub mod config;
pub mod error;
pub mod registry;
pub mod routes;
pub mod stats;

pub use config::{ConfigError, HubConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_RECENT_LOG_CAPACITY};
pub use error::{DeliveryError, HubError, HubResult};
pub use registry::{ClientEntry, ClientId, ClientRegistry};
pub use routes::{CommandRoute, RouteTable};
pub use stats::{HubStats, RecentMessage};
