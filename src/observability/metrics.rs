//! Metrics collection and exposition.
//!
//! # Metrics
//! - `graph_handshakes_total` (counter): outbound handshakes by kind, outcome
//! - `graph_topology_events_total` (counter): establish/teardown transitions
//! - `graph_teardowns_total` (counter): teardowns by reason
//! - `graph_liveness_failures_total` (counter): failed probes
//! - `graph_connected_peers` (gauge): connected peers per node
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::peer::PeerId;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_handshake(kind: &'static str, outcome: &'static str) {
    metrics::counter!("graph_handshakes_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_topology(event: &'static str) {
    metrics::counter!("graph_topology_events_total", "event" => event).increment(1);
}

pub fn record_teardown(reason: &'static str) {
    metrics::counter!("graph_teardowns_total", "reason" => reason).increment(1);
}

pub fn record_liveness_failure() {
    metrics::counter!("graph_liveness_failures_total").increment(1);
}

pub fn set_connected_peers(node: &PeerId, count: usize) {
    metrics::gauge!("graph_connected_peers", "node" => node.to_string()).set(count as f64);
}
