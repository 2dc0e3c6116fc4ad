//! Metrics collection and exposition.
//!
//! # Metrics
//! - `minitrue_requests_total` (counter): relayed requests by method, status, mode
//! - `minitrue_request_duration_seconds` (histogram): latency by mode
//! - `minitrue_misdirections_total` (counter): requests sent somewhere else
//! - `minitrue_hook_failures_total` (counter): hook failures by stage
//! - `minitrue_active_connections` (gauge): current client connection count

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// How a response reached the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Streamed straight from upstream.
    PassThrough,
    /// Captured, mangled, then replayed.
    Mangled,
    /// Error response generated by the proxy itself.
    Error,
}

impl RelayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::PassThrough => "passthrough",
            RelayMode::Mangled => "mangled",
            RelayMode::Error => "error",
        }
    }
}

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "failed to install metrics exporter"),
    }
}

pub fn record_relay(method: &str, status: u16, mode: RelayMode, start: Instant) {
    counter!(
        "minitrue_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "mode" => mode.as_str()
    )
    .increment(1);
    histogram!("minitrue_request_duration_seconds", "mode" => mode.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_misdirection() {
    counter!("minitrue_misdirections_total").increment(1);
}

pub fn record_hook_failure(stage: &'static str) {
    counter!("minitrue_hook_failures_total", "stage" => stage).increment(1);
}

pub fn connection_opened() {
    gauge!("minitrue_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("minitrue_active_connections").decrement(1.0);
}
