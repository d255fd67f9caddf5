//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a graph
//! deployment. All types derive Serde traits for deserialization from
//! config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GraphConfig {
    /// Liveness probing of established connections.
    pub liveness: LivenessConfig,

    /// In-process transport settings.
    pub transport: TransportConfig,

    /// Built-in approval policies installed on every node.
    pub policy: PolicyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Nodes to start, with the links each one requests at startup.
    pub nodes: Vec<NodeConfig>,
}

/// Liveness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Probe established connections. Only tests turn this off.
    pub enabled: bool,

    /// Fixed period between probes in milliseconds.
    pub interval_ms: u64,

    /// Time a single probe may take before the peer counts as lost.
    pub timeout_ms: u64,
}

impl LivenessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1_000,
            timeout_ms: 1_000,
        }
    }
}

/// In-process transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum time a call may take in milliseconds.
    pub call_timeout_ms: u64,

    /// Simulated one-way delivery latency in milliseconds.
    pub latency_ms: u64,

    /// Upper bound of random extra latency in milliseconds.
    pub latency_jitter_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 5_000,
            latency_ms: 0,
            latency_jitter_ms: 0,
        }
    }
}

/// Built-in connect policies.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Deny inbound connects once this many peers are connected.
    pub max_peers: Option<usize>,

    /// Only accept inbound connects from these identities. Empty allows all.
    pub allow: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// One node to start.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Identity on the transport.
    pub id: String,

    /// Peers this node asks to connect to once every node is up.
    #[serde(default)]
    pub links: Vec<String>,
}
