//! Transport adapters.

pub mod memory;
pub mod ws;

pub use memory::{MemoryConnector, MemoryHub, MemoryPeer};
pub use ws::WsConnector;
