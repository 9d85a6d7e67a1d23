//! Prometheus metrics for the relay hub.
//!
//! All metrics follow the naming convention: `bridge_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_routed_total)
//! - **Gauge**: Value that can go up or down (e.g., connections_active)
//! - **Histogram**: Distribution of values (e.g., command_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry served at `/metrics`
    pub static ref REGISTRY: Registry = Registry::new();

    /// Messages routed, by message type
    pub static ref MESSAGES_ROUTED: IntCounterVec = IntCounterVec::new(
        Opts::new("bridge_messages_routed_total", "Messages accepted and routed by the hub"),
        &["type"]
    ).expect("metric creation failed");

    /// Frames refused, by error code
    pub static ref MESSAGES_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("bridge_messages_rejected_total", "Frames rejected by the hub"),
        &["code"]
    ).expect("metric creation failed");

    pub static ref CONNECTIONS_ACTIVE: IntGauge = IntGauge::new(
        "bridge_connections_active",
        "Currently connected peers"
    ).expect("metric creation failed");

    pub static ref CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "bridge_connections_total",
        "Peer connections accepted since start"
    ).expect("metric creation failed");

    pub static ref DISCONNECTIONS: IntCounter = IntCounter::new(
        "bridge_disconnections_total",
        "Peer disconnections since start"
    ).expect("metric creation failed");

    /// Commands between `command_execute` and `command_response`
    pub static ref COMMANDS_IN_FLIGHT: IntGauge = IntGauge::new(
        "bridge_commands_in_flight",
        "Commands routed to an executor and awaiting a result"
    ).expect("metric creation failed");

    /// Request-to-result latency of routed commands
    pub static ref COMMAND_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "bridge_command_duration_seconds",
            "Time from command_request to command_result at the hub"
        ).buckets(exponential_buckets(0.001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_ROUTED.clone()),
        Box::new(MESSAGES_REJECTED.clone()),
        Box::new(CONNECTIONS_ACTIVE.clone()),
        Box::new(CONNECTIONS_TOTAL.clone()),
        Box::new(DISCONNECTIONS.clone()),
        Box::new(COMMANDS_IN_FLIGHT.clone()),
        Box::new(COMMAND_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
