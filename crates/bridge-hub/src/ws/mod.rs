//! WebSocket transport for peers.
//!
//! Each frame is one JSON-encoded envelope. Oversized and malformed frames
//! are answered by the routing core, never by closing the socket.

pub mod handler;

pub use handler::handle_socket;
