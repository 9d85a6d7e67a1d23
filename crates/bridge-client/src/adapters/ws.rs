//! WebSocket adapter over `tokio-tungstenite`.
//!
//! Control frames are handled by tungstenite itself; only text frames reach
//! the connection manager. Binary frames are not part of the protocol and are
//! skipped.

use crate::error::TransportError;
use crate::transport::{Connector, Duplex, FrameSink, FrameStream};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production [`Connector`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError> {
        let (stream, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        let (sink, stream) = stream.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsReader { stream })))
    }
}

struct WsSink {
    sink: SplitSink<WsStream, WsMessage>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsReader {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Some(Ok(text)),
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "Hub closed the WebSocket");
                    return None;
                }
                // Ping/pong are answered by tungstenite; raw frames never surface on read.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(TransportError::Receive(e.to_string()))),
                None => return None,
            }
        }
    }
}
