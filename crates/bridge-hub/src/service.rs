//! Hub server: HTTP/WebSocket surface and background maintenance.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /`, `GET /ws` | WebSocket upgrade for peers |
//! | `GET /health` | liveness and connected-client count |
//! | `GET /stats` | the current `bridge_stats` message |
//! | `GET /metrics` | Prometheus text format |

use crate::domain::{HubConfig, HubError, HubResult};
use crate::router::Hub;
use crate::ws::handle_socket;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bridge_telemetry::{encode_metrics, register_metrics};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The relay hub bound to its HTTP surface.
pub struct HubServer {
    hub: Arc<Hub>,
}

impl HubServer {
    /// Validate `config` and build the server. Registers hub metrics.
    pub fn new(config: HubConfig) -> HubResult<Self> {
        config.validate()?;
        register_metrics()?;
        Ok(Self {
            hub: Arc::new(Hub::new(config)),
        })
    }

    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Bind the configured address. Port 0 picks a free port, which is then
    /// reported in `bridge_stats`.
    pub async fn bind(&self) -> HubResult<TcpListener> {
        let addr = self.hub.config().bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| HubError::Bind { addr, source })?;
        self.hub.set_port(listener.local_addr()?.port());
        Ok(listener)
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_upgrade))
            .route("/ws", get(ws_upgrade))
            .route("/health", get(health_check))
            .route("/stats", get(stats))
            .route("/metrics", get(metrics))
            .with_state(Arc::clone(&self.hub))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> HubResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let maintenance = self.start_maintenance();
        let router = self.router();

        info!(addr = ?listener.local_addr().ok(), "Relay hub listening");
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        maintenance.abort();
        if let Err(e) = &result {
            error!(error = %e, "Relay hub server error");
        }
        info!("Relay hub stopped");
        result.map_err(HubError::Server)
    }

    /// Periodic `bridge_stats` broadcast and stale-route pruning.
    fn start_maintenance(&self) -> JoinHandle<()> {
        let hub = Arc::clone(&self.hub);
        let period = hub.config().stats_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                hub.broadcast_stats();
                hub.prune_routes();
            }
        })
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(hub, socket))
}

async fn health_check(State(hub): State<Arc<Hub>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "clients": hub.client_count(),
        "commandsInFlight": hub.commands_in_flight(),
    }))
}

async fn stats(State(hub): State<Arc<Hub>>) -> Result<Json<Value>, (StatusCode, String)> {
    hub.stats_message()
        .to_value()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}
