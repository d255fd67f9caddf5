//! Shared helpers for graph integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use swarm_graph::config::{LivenessConfig, TransportConfig};
use swarm_graph::transport::{MemoryTransport, RequestHandler, Transport, TransportError};
use swarm_graph::{GraphNode, MemoryNetwork, PeerId, TopologyEvent};

pub const PROBE_INTERVAL_MS: u64 = 50;

/// Network with a short call timeout so failures surface quickly.
pub fn network() -> MemoryNetwork {
    MemoryNetwork::new(TransportConfig {
        call_timeout_ms: 150,
        ..TransportConfig::default()
    })
}

pub fn fast_liveness() -> LivenessConfig {
    LivenessConfig {
        enabled: true,
        interval_ms: PROBE_INTERVAL_MS,
        timeout_ms: PROBE_INTERVAL_MS,
    }
}

pub fn no_liveness() -> LivenessConfig {
    LivenessConfig {
        enabled: false,
        ..fast_liveness()
    }
}

pub fn node(net: &MemoryNetwork, id: &str) -> GraphNode {
    GraphNode::new(net.endpoint(id), fast_liveness())
}

pub fn peer(id: &str) -> PeerId {
    PeerId::new(id)
}

/// Count of hook invocations, shareable with a hook closure.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collect every event currently buffered, waiting briefly for stragglers.
pub async fn drain_events(rx: &mut broadcast::Receiver<TopologyEvent>) -> Vec<TopologyEvent> {
    let mut events = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
        events.push(event);
    }
    events
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Transport wrapper counting outbound pings.
#[derive(Clone)]
pub struct CountingTransport {
    inner: MemoryTransport,
    pings: Calls,
}

impl CountingTransport {
    pub fn new(inner: MemoryTransport) -> (Self, Calls) {
        let pings = Calls::default();
        (
            Self {
                inner,
                pings: pings.clone(),
            },
            pings,
        )
    }
}

#[async_trait]
impl Transport for CountingTransport {
    fn local_id(&self) -> &PeerId {
        self.inner.local_id()
    }

    async fn send(&self, remote: &PeerId, channel: &str, payload: Value) -> Result<Value, TransportError> {
        if payload.get("request").and_then(Value::as_str) == Some("ping") {
            self.pings.hit();
        }
        self.inner.send(remote, channel, payload).await
    }

    fn on_request(&self, channel: &str, handler: RequestHandler) {
        self.inner.on_request(channel, handler);
    }

    fn remove_handler(&self, channel: &str) {
        self.inner.remove_handler(channel);
    }
}
