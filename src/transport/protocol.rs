//! Graph sub-protocol carried on a single transport channel.
//!
//! | request            | data        | response                         |
//! |--------------------|-------------|----------------------------------|
//! | `ping`             | none        | `true`, or fails `not-connected` |
//! | `connect`          | opaque      | boolean approval                 |
//! | `disconnect`       | opaque      | boolean approval                 |
//! | `force-disconnect` | none        | none                             |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::TransportError;

/// Channel the graph protocol is multiplexed on.
pub const CHANNEL: &str = "swarm-graph/v1";

/// One graph protocol request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", content = "data", rename_all = "kebab-case")]
pub enum GraphRequest {
    Ping,
    Connect(Value),
    Disconnect(Value),
    ForceDisconnect,
}

impl GraphRequest {
    /// Tag as it appears on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            GraphRequest::Ping => "ping",
            GraphRequest::Connect(_) => "connect",
            GraphRequest::Disconnect(_) => "disconnect",
            GraphRequest::ForceDisconnect => "force-disconnect",
        }
    }

    pub fn encode(&self) -> Result<Value, TransportError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode an inbound payload. Unknown tags are an error the caller drops.
    pub fn decode(payload: Value) -> Result<Self, TransportError> {
        Ok(serde_json::from_value(payload)?)
    }
}

/// Read a boolean approval out of a response. Anything else is a denial.
pub fn approval(response: &Value) -> bool {
    response.as_bool().unwrap_or(false)
}
