//! Per-dispatch handler context.

use serde_json::{Map, Value};

use crate::graph::state::ConnectionState;
use crate::peer::PeerId;
use crate::transport::RemoteFailure;

/// Context threaded through one hook chain run.
///
/// Built from the dispatcher's globals overridden by the caller's seed,
/// then mutated in place by every handler. The final `result` is the
/// approval decision; `None` means nothing ever decided and counts as a
/// denial.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Current decision. Overwritten by every handler's return value.
    pub result: Option<bool>,
    /// Identity of the peer whose request is being judged.
    pub remote: PeerId,
    /// The connection's state. Fresh and empty for connect, the live
    /// record for disconnect.
    pub state: ConnectionState,
    /// Free-form fields: dispatcher globals first, then seed fields.
    pub fields: Map<String, Value>,
    failure: Option<RemoteFailure>,
}

impl HandlerContext {
    /// Context with no decision yet.
    pub fn new(remote: PeerId, state: ConnectionState) -> Self {
        Self {
            result: None,
            remote,
            state,
            fields: Map::new(),
            failure: None,
        }
    }

    /// Seed a default decision.
    pub fn with_result(mut self, result: bool) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// True only when the chain ended on an explicit approval.
    pub fn approved(&self) -> bool {
        self.result == Some(true) && self.failure.is_none()
    }

    /// Abort the inbound call with a named condition.
    ///
    /// The requesting node observes this as a failed call, which it
    /// treats as a denial. Later handlers still run; the first failure
    /// recorded wins.
    pub fn fail(&mut self, name: impl Into<String>, message: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(RemoteFailure::new(name, message));
        }
    }

    pub fn failure(&self) -> Option<&RemoteFailure> {
        self.failure.as_ref()
    }

    pub(crate) fn take_failure(&mut self) -> Option<RemoteFailure> {
        self.failure.take()
    }
}
