//! In-process transport.
//!
//! # Responsibilities
//! - Register one endpoint per node identity
//! - Deliver calls to the remote endpoint's channel handler
//! - Enforce the per-call timeout
//! - Simulate latency and dead or frozen processes
//!
//! # Design Decisions
//! - Inbound handlers run on their own task, so a caller that gives up
//!   never cancels work already started on the remote side
//! - A closed endpoint is gone from the registry: calls to it fail fast
//! - A suspended endpoint swallows calls in both directions until the
//!   caller's timeout fires

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::config::TransportConfig;
use crate::peer::PeerId;
use crate::transport::{RemoteFailure, RequestContext, RequestHandler, Transport, TransportError};

#[derive(Default)]
struct Endpoint {
    handlers: DashMap<String, RequestHandler>,
    closed: AtomicBool,
    suspended: AtomicBool,
}

impl Endpoint {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}

/// A set of in-process endpoints that can call each other.
#[derive(Clone)]
pub struct MemoryNetwork {
    endpoints: Arc<DashMap<PeerId, Arc<Endpoint>>>,
    config: TransportConfig,
}

impl MemoryNetwork {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            endpoints: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Register a fresh endpoint for `id`, replacing any previous one.
    pub fn endpoint(&self, id: impl Into<PeerId>) -> MemoryTransport {
        let id = id.into();
        let endpoint = Arc::new(Endpoint::default());
        if let Some(previous) = self.endpoints.insert(id.clone(), endpoint.clone()) {
            previous.closed.store(true, Ordering::SeqCst);
        }
        tracing::debug!(node = %id, "Endpoint registered");

        MemoryTransport {
            id,
            endpoint,
            network: self.clone(),
        }
    }

    /// Simulate the process behind `id` going away.
    ///
    /// Returns false if no such endpoint was registered.
    pub fn close(&self, id: &PeerId) -> bool {
        match self.endpoints.remove(id) {
            Some((_, endpoint)) => {
                endpoint.closed.store(true, Ordering::SeqCst);
                tracing::info!(node = %id, "Endpoint closed");
                true
            }
            None => false,
        }
    }

    /// Freeze or unfreeze the process behind `id`.
    pub fn set_suspended(&self, id: &PeerId, suspended: bool) -> bool {
        match self.endpoints.get(id) {
            Some(endpoint) => {
                endpoint.suspended.store(suspended, Ordering::SeqCst);
                tracing::info!(node = %id, suspended, "Endpoint suspension changed");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.endpoints.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn lookup(&self, id: &PeerId) -> Option<Arc<Endpoint>> {
        self.endpoints.get(id).map(|entry| entry.value().clone())
    }

    fn latency(&self) -> Duration {
        let jitter = match self.config.latency_jitter_ms {
            0 => 0,
            max => fastrand::u64(0..=max),
        };
        Duration::from_millis(self.config.latency_ms + jitter)
    }
}

/// One node's handle on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryTransport {
    id: PeerId,
    endpoint: Arc<Endpoint>,
    network: MemoryNetwork,
}

impl MemoryTransport {
    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    async fn deliver(&self, remote: &PeerId, channel: &str, payload: Value) -> Result<Value, TransportError> {
        if self.endpoint.is_closed() {
            return Err(TransportError::Unreachable(remote.clone()));
        }

        let target = self
            .network
            .lookup(remote)
            .ok_or_else(|| TransportError::Unreachable(remote.clone()))?;

        if self.endpoint.is_suspended() || target.is_suspended() {
            std::future::pending::<()>().await;
        }

        let handler = target
            .handlers
            .get(channel)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::Unreachable(remote.clone()))?;

        let ctx = RequestContext {
            sender: self.id.clone(),
            request_id: uuid::Uuid::new_v4(),
        };
        tracing::trace!(
            from = %self.id,
            to = %remote,
            channel,
            request_id = %ctx.request_id,
            "Delivering call"
        );

        let latency = self.network.latency();
        let task = tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            handler(ctx, payload).await
        });

        match task.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => Err(TransportError::Remote(failure)),
            Err(e) => Err(TransportError::Remote(RemoteFailure::new("internal", e.to_string()))),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn send(&self, remote: &PeerId, channel: &str, payload: Value) -> Result<Value, TransportError> {
        let timeout_ms = self.network.config.call_timeout_ms;
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.deliver(remote, channel, payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                peer: remote.clone(),
                timeout_ms,
            }),
        }
    }

    fn on_request(&self, channel: &str, handler: RequestHandler) {
        self.endpoint.handlers.insert(channel.to_string(), handler);
    }

    fn remove_handler(&self, channel: &str) {
        self.endpoint.handlers.remove(channel);
    }
}
