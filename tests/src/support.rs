//! Test harness: an in-process hub on an ephemeral port and peers that
//! talk to it over real WebSockets.

use bridge_client::{ClientConfig, ConnectionManager, ReconnectPolicy};
use bridge_hub::{Hub, HubConfig, HubServer};
use bridge_protocol::SourceRole;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub struct TestHub {
    pub addr: SocketAddr,
    pub hub: Arc<Hub>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestHub {
    pub async fn start() -> Self {
        Self::start_with(HubConfig::default()).await
    }

    /// Start with `config`, overriding the bind address to loopback:0.
    pub async fn start_with(config: HubConfig) -> Self {
        let config = HubConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            ..config
        };
        let server = HubServer::new(config).expect("valid hub config");
        let listener = server.bind().await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let hub = server.hub();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run(listener, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            hub,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Client config for `role` pointed at this hub, without auto-reconnect.
    pub fn client_config(&self, role: SourceRole) -> ClientConfig {
        let mut config = ClientConfig::for_role(role).with_url(self.url());
        config.reconnect = ReconnectPolicy::disabled();
        config
    }

    /// A connected peer, already identified by the hub.
    pub async fn peer(&self, role: SourceRole) -> ConnectionManager {
        self.peer_with(self.client_config(role)).await
    }

    pub async fn peer_with(&self, config: ClientConfig) -> ConnectionManager {
        let before = self.hub.stats().clients.len();
        let manager = ConnectionManager::websocket(config).expect("valid client config");
        manager.connect().await.expect("connect to test hub");
        self.wait_for_identified(before + 1).await;
        manager
    }

    /// Wait until at least `count` clients have announced their role.
    pub async fn wait_for_identified(&self, count: usize) {
        self.wait_until(|hub| hub.stats().clients.len() >= count).await;
    }

    /// Poll `condition` until it holds, panicking after [`WAIT`].
    pub async fn wait_until(&self, condition: impl Fn(&Hub) -> bool) {
        tokio::time::timeout(WAIT, async {
            while !condition(&self.hub) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("hub condition not reached in time");
    }

    /// A bare WebSocket, for frames the client library refuses to send.
    pub async fn raw_socket(&self) -> RawPeer {
        let (socket, _) = tokio_tungstenite::connect_async(self.url())
            .await
            .expect("raw connect");
        RawPeer { socket }
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct RawPeer {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RawPeer {
    pub async fn send_text(&mut self, text: impl Into<String>) {
        self.socket
            .send(WsMessage::Text(text.into()))
            .await
            .expect("raw send");
    }

    /// Next text frame, decoded as JSON.
    pub async fn next_json(&mut self) -> serde_json::Value {
        let frame = tokio::time::timeout(WAIT, async {
            loop {
                match self.socket.next().await {
                    Some(Ok(WsMessage::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("raw socket ended: {other:?}"),
                }
            }
        })
        .await
        .expect("no frame in time");
        serde_json::from_str(&frame).expect("hub frames are JSON")
    }
}
