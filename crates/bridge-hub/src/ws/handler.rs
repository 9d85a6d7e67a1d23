//! WebSocket connection task.
//!
//! One task per socket: the read half feeds [`Hub::handle_frame`], a spawned
//! writer drains the client's outbound buffer into the write half. The
//! writer ends on its own once the hub detaches the client and drops the
//! buffer's sender.

use crate::router::{ClientHandle, Hub};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Serve one peer until its socket closes.
pub async fn handle_socket(hub: Arc<Hub>, socket: WebSocket) {
    let ClientHandle { id, mut outbound } = hub.attach();
    let (mut sink, mut stream) = socket.split();

    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!(client_id = %writer_id, error = %e, "WebSocket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => hub.handle_frame(&id, &text),
            Ok(Message::Binary(data)) => {
                // Frames are JSON text; a binary frame is decoded leniently
                // so that a bad one is answered like any other bad JSON.
                hub.handle_frame(&id, &String::from_utf8_lossy(&data));
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Control frames are answered by the WebSocket layer.
            }
            Ok(Message::Close(_)) => {
                debug!(client_id = %id, "WebSocket close received");
                break;
            }
            Err(e) => {
                warn!(client_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    hub.detach(&id);
    if let Err(e) = writer.await {
        debug!(client_id = %id, error = %e, "Writer task ended abnormally");
    }
    info!(client_id = %id, "WebSocket connection closed");
}
