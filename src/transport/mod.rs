//! Request/response transport the graph layer runs on.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     GraphNode → send(remote, channel, payload)
//!     → remote's handler for `channel`
//!     → Ok(response) | Err(TransportError)
//!
//! Inbound:
//!     on_request(channel, handler)
//!     → handler(RequestContext { sender }, payload)
//!     → Ok(response) | Err(RemoteFailure) seen by the caller as
//!       TransportError::Remote
//! ```
//!
//! # Design Decisions
//! - Addressing, delivery and serialization belong to the transport
//! - Payloads are JSON values; the graph protocol encodes itself on top
//! - A handler's named failure crosses the wire intact so callers can
//!   tell "not connected" apart from generic trouble

pub mod memory;
pub mod protocol;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::peer::PeerId;

pub use memory::{MemoryNetwork, MemoryTransport};

/// Failure name used when a ping reaches a node that holds no link to the sender.
pub const NOT_CONNECTED: &str = "not-connected";

/// A named failure raised by an inbound handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    pub name: String,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_connected() -> Self {
        Self::new(NOT_CONNECTED, "Node is not connected")
    }
}

/// Errors observed by the sending side of a call.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No endpoint is registered for the remote or channel.
    #[error("peer {0} is unreachable")]
    Unreachable(PeerId),

    /// The remote did not answer within the call timeout.
    #[error("call to {peer} timed out after {timeout_ms} ms")]
    Timeout { peer: PeerId, timeout_ms: u64 },

    /// The remote handler failed the call with a named condition.
    #[error("remote failure {}: {}", .0.name, .0.message)]
    Remote(RemoteFailure),

    /// The payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl TransportError {
    /// True when the remote answered "I am not connected to you".
    pub fn is_not_connected(&self) -> bool {
        matches!(self, TransportError::Remote(f) if f.name == NOT_CONNECTED)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Codec(e.to_string())
    }
}

/// Metadata handed to an inbound handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Identity of the calling node.
    pub sender: PeerId,
    /// Correlation id of this call, for logs.
    pub request_id: uuid::Uuid,
}

impl RequestContext {
    /// Build the failure a handler returns to abort the call.
    pub fn fail(&self, name: impl Into<String>, message: impl Into<String>) -> RemoteFailure {
        RemoteFailure::new(name, message)
    }
}

/// Handler for one inbound channel.
pub type RequestHandler =
    Arc<dyn Fn(RequestContext, Value) -> BoxFuture<'static, Result<Value, RemoteFailure>> + Send + Sync>;

/// Unicast request/response transport bound to one local identity.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Stable identity of the local node.
    fn local_id(&self) -> &PeerId;

    /// Call `remote` on `channel` and wait for its response.
    async fn send(&self, remote: &PeerId, channel: &str, payload: Value) -> Result<Value, TransportError>;

    /// Route inbound calls on `channel` to `handler`, replacing any previous one.
    fn on_request(&self, channel: &str, handler: RequestHandler);

    /// Stop routing inbound calls on `channel`.
    fn remove_handler(&self, channel: &str);
}
