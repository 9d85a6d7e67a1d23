//! Transport port.
//!
//! The connection manager only needs a message-framed duplex: a sink for
//! outbound text frames and a stream of inbound text frames. Adapters live in
//! [`crate::adapters`].

use crate::error::TransportError;
use async_trait::async_trait;

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one JSON text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Further sends fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound text frame. `None` once the remote side has closed.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;
}

/// Both halves of an open connection.
pub type Duplex = (Box<dyn FrameSink>, Box<dyn FrameStream>);

/// Opens connections to the hub.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError>;
}
