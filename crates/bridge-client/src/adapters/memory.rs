//! In-process transport.
//!
//! [`MemoryConnector`] hands every accepted connection to a [`MemoryHub`],
//! which plays the remote side: it sees the frames the client sends and can
//! push frames back or hang up. Used by tests and by embedders that run the
//! hub in the same process.

use crate::error::TransportError;
use crate::transport::{Connector, Duplex, FrameSink, FrameStream};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Client-side connector backed by channels.
#[derive(Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

/// Receives the remote side of every connection a [`MemoryConnector`] opens.
pub struct MemoryHub {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// The remote end of one in-memory connection.
pub struct MemoryPeer {
    /// Frames sent by the client.
    from_client: mpsc::UnboundedReceiver<String>,
    /// Frames delivered to the client. Dropping it closes the connection.
    to_client: Option<mpsc::UnboundedSender<String>>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryHub) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                accept_tx,
                refuse: Arc::new(AtomicBool::new(false)),
                attempts: Arc::new(AtomicUsize::new(0)),
            },
            MemoryHub { accept_rx },
        )
    }

    /// Make subsequent connection attempts fail (or succeed again).
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of connection attempts so far, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }

        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();
        self.accept_tx
            .send(MemoryPeer {
                from_client,
                to_client: Some(to_client),
            })
            .map_err(|_| TransportError::Connect {
                url: url.to_string(),
                reason: "memory hub is gone".into(),
            })?;

        Ok((
            Box::new(MemorySink { tx: Some(client_tx) }),
            Box::new(MemoryStream { rx: client_rx }),
        ))
    }
}

impl MemoryHub {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }
}

impl MemoryPeer {
    /// Next frame sent by the client; `None` once it closed its side.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Deliver a frame to the client. Returns false if it is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(frame.into()).is_ok())
    }

    /// Hang up: the client's stream ends.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(text).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}
