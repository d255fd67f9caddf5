//! Connection manager for one node.
//!
//! # Responsibilities
//! - Run the connect/disconnect handshake in both directions
//! - Consult approval hooks for inbound requests
//! - Own the peer table and each connection's liveness probe
//! - Publish passive topology notifications
//!
//! # State Machine (per remote, local view)
//! ```text
//! Disconnected → Connected:    connect approved (either direction)
//! Connected → Disconnected:    disconnect approved (either direction),
//!                              force disconnect (local, remote or liveness)
//! Denials are self-loops and change nothing.
//! ```
//!
//! # Design Decisions
//! - Every public outcome is a boolean; transport trouble never surfaces
//! - connect: any transport failure is a denial, never retried
//! - disconnect: any failed call severs the link unilaterally
//! - Inbound requests from one remote are not serialized against each
//!   other; entry checks are idempotent and every table mutation is atomic

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::config::LivenessConfig;
use crate::graph::events::{EventBus, TopologyEvent};
use crate::graph::liveness;
use crate::graph::state::{ConnectionState, StateMap};
use crate::graph::table::PeerTable;
use crate::hooks::{HandlerContext, HookDispatcher};
use crate::observability::metrics;
use crate::peer::{ConnectionId, PeerId};
use crate::transport::protocol::{approval, GraphRequest, CHANNEL};
use crate::transport::{RemoteFailure, RequestContext, Transport, TransportError};

/// Events approval hooks can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Connect,
    Disconnect,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Connect => "connect",
            HookEvent::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a connection went away. Logged and counted, never exposed in events.
#[derive(Debug, Clone, Copy)]
enum TeardownReason {
    /// A graceful disconnect was approved.
    Approved,
    /// This node severed the link.
    Forced,
    /// The remote told us it severed the link.
    RemoteForced,
    /// The liveness probe failed.
    LivenessLost,
    /// The node is shutting down.
    Closed,
}

impl TeardownReason {
    fn as_str(&self) -> &'static str {
        match self {
            TeardownReason::Approved => "approved",
            TeardownReason::Forced => "forced",
            TeardownReason::RemoteForced => "remote_forced",
            TeardownReason::LivenessLost => "liveness_lost",
            TeardownReason::Closed => "closed",
        }
    }
}

/// A node participating in the connection graph.
///
/// Cheap to clone; clones share the same peer table, hooks and timers.
/// Probes and force-disconnect notices run on the ambient Tokio runtime.
#[derive(Clone)]
pub struct GraphNode {
    inner: Arc<NodeInner>,
}

pub(crate) struct NodeInner {
    me: Weak<NodeInner>,
    id: PeerId,
    transport: Arc<dyn Transport>,
    peers: PeerTable,
    hooks: HookDispatcher<HookEvent>,
    events: EventBus,
    liveness: LivenessConfig,
    extensions: StateMap,
}

impl GraphNode {
    /// Bind a node to `transport` and start answering graph requests.
    pub fn new(transport: impl Transport, liveness: LivenessConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let id = transport.local_id().clone();

        let mut globals = Map::new();
        globals.insert("node".to_string(), Value::String(id.to_string()));

        let inner = Arc::new_cyclic(|me| NodeInner {
            me: me.clone(),
            id,
            transport,
            peers: PeerTable::new(),
            hooks: HookDispatcher::with_globals(globals),
            events: EventBus::new(),
            liveness,
            extensions: StateMap::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner.transport.on_request(
            CHANNEL,
            Arc::new(move |ctx: RequestContext, payload: Value| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(node) => node.handle_request(ctx, payload).await,
                        None => Err(RemoteFailure::new("unavailable", "node has shut down")),
                    }
                }
                .boxed()
            }),
        );

        tracing::info!(
            node = %inner.id,
            liveness_interval_ms = inner.liveness.interval_ms,
            liveness_enabled = inner.liveness.enabled,
            "Graph node started"
        );

        Self { inner }
    }

    pub fn id(&self) -> &PeerId {
        &self.inner.id
    }

    /// A handle that does not keep the node alive, for hooks that need to
    /// look back at their own node.
    pub fn downgrade(&self) -> WeakGraphNode {
        WeakGraphNode {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Ask `remote` for a connection.
    ///
    /// Returns true once the connection is established on both sides.
    /// Denial, an unreachable remote and any other transport failure all
    /// return false and change nothing.
    pub async fn connect(&self, remote: &PeerId, data: Value) -> bool {
        self.inner.send_connect(remote, data).await
    }

    /// Ask `remote` to end the connection gracefully.
    ///
    /// Returns true iff the link is gone from the local table when this
    /// returns: the remote approved (or was not connected), or the call
    /// failed for any reason and the link was severed unilaterally.
    /// Returns false only when the remote answered with a refusal, in
    /// which case the link stays up.
    pub async fn disconnect(&self, remote: &PeerId, data: Value) -> bool {
        self.inner.send_disconnect(remote, data).await
    }

    /// Sever the connection to `remote` without asking.
    ///
    /// Cannot be refused and never consults hooks. The remote gets a
    /// best-effort notice. Returns false if there was no connection.
    pub fn force_disconnect(&self, remote: &PeerId) -> bool {
        self.inner.force_disconnect(remote, TeardownReason::Forced)
    }

    /// Append an approval hook for `event`.
    ///
    /// Hooks run in registration order for every inbound request of that
    /// kind; the last one's return value decides. With no hooks every
    /// request is approved.
    pub fn register<F>(&self, event: HookEvent, handler: F)
    where
        F: for<'a> Fn(&'a mut HandlerContext, &'a Value) -> BoxFuture<'a, bool> + Send + Sync + 'static,
    {
        self.inner.hooks.register(event, handler);
    }

    /// Receive topology notifications from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of connected peer identities, sorted.
    pub fn connections(&self) -> Vec<PeerId> {
        self.inner.peers.connections()
    }

    /// Snapshot of every connection's state.
    ///
    /// The map is a copy but its values are not: each `ConnectionState`
    /// aliases the live record, so writes through it are visible to hooks
    /// and to later snapshots until the connection is torn down.
    pub fn states(&self) -> HashMap<PeerId, ConnectionState> {
        self.inner.peers.states()
    }

    /// The live state of one connection (aliased, like [`states`](Self::states)).
    pub fn state(&self, remote: &PeerId) -> Option<ConnectionState> {
        self.inner.peers.state(remote)
    }

    pub fn is_connected(&self, remote: &PeerId) -> bool {
        self.inner.peers.contains(remote)
    }

    /// Free-form slot for collaborators; the graph never reads it.
    pub fn extensions(&self) -> &StateMap {
        &self.inner.extensions
    }

    /// Stop answering graph requests and sever every connection.
    ///
    /// Returns how many connections were severed.
    pub fn close(&self) -> usize {
        self.inner.close()
    }
}

/// Non-owning handle to a [`GraphNode`].
#[derive(Clone)]
pub struct WeakGraphNode {
    inner: Weak<NodeInner>,
}

impl WeakGraphNode {
    pub fn upgrade(&self) -> Option<GraphNode> {
        self.inner.upgrade().map(|inner| GraphNode { inner })
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.inner.id)
            .field("connections", &self.inner.peers.connections())
            .finish()
    }
}

impl NodeInner {
    pub(crate) fn id(&self) -> &PeerId {
        &self.id
    }

    pub(crate) async fn send_request(&self, remote: &PeerId, request: GraphRequest) -> Result<Value, TransportError> {
        let payload = request.encode()?;
        self.transport.send(remote, CHANNEL, payload).await
    }

    // --- Outbound ---

    async fn send_connect(&self, remote: &PeerId, data: Value) -> bool {
        if remote == &self.id {
            tracing::warn!(node = %self.id, "Refusing to connect to self");
            return false;
        }

        tracing::debug!(node = %self.id, remote = %remote, "Sending connection request");
        let response = match self.send_request(remote, GraphRequest::Connect(data)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(node = %self.id, remote = %remote, error = %e, "Connection request failed");
                metrics::record_handshake("connect", "failed");
                return false;
            }
        };

        let approved = approval(&response);
        tracing::debug!(
            node = %self.id,
            remote = %remote,
            approved,
            "Connection request answered"
        );
        if approved {
            metrics::record_handshake("connect", "approved");
            self.establish(remote, ConnectionState::new());
        } else {
            metrics::record_handshake("connect", "denied");
        }
        approved
    }

    async fn send_disconnect(&self, remote: &PeerId, data: Value) -> bool {
        tracing::debug!(node = %self.id, remote = %remote, "Sending disconnect request");
        match self.send_request(remote, GraphRequest::Disconnect(data)).await {
            Ok(response) if approval(&response) => {
                metrics::record_handshake("disconnect", "approved");
                self.teardown(remote, TeardownReason::Approved);
                true
            }
            Ok(_) => {
                tracing::debug!(node = %self.id, remote = %remote, "Disconnect request refused");
                metrics::record_handshake("disconnect", "denied");
                false
            }
            Err(e) => {
                tracing::warn!(
                    node = %self.id,
                    remote = %remote,
                    error = %e,
                    "Disconnect request failed, severing connection"
                );
                metrics::record_handshake("disconnect", "severed");
                self.force_disconnect(remote, TeardownReason::Forced);
                true
            }
        }
    }

    // --- Inbound ---

    async fn handle_request(&self, ctx: RequestContext, payload: Value) -> Result<Value, RemoteFailure> {
        let request = match GraphRequest::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(
                    node = %self.id,
                    sender = %ctx.sender,
                    request_id = %ctx.request_id,
                    error = %e,
                    "Dropping unrecognized graph request"
                );
                return Ok(Value::Null);
            }
        };

        let remote = ctx.sender;
        match request {
            GraphRequest::Ping => {
                tracing::trace!(node = %self.id, remote = %remote, "Pinged");
                if self.peers.contains(&remote) {
                    Ok(Value::Bool(true))
                } else {
                    Err(RemoteFailure::not_connected())
                }
            }
            GraphRequest::Connect(data) => self.receive_connect(remote, data).await.map(Value::Bool),
            GraphRequest::Disconnect(data) => self.receive_disconnect(remote, data).await.map(Value::Bool),
            GraphRequest::ForceDisconnect => {
                self.teardown(&remote, TeardownReason::RemoteForced);
                Ok(Value::Null)
            }
        }
    }

    async fn receive_connect(&self, remote: PeerId, data: Value) -> Result<bool, RemoteFailure> {
        tracing::debug!(node = %self.id, remote = %remote, "Received connection request");
        if self.peers.contains(&remote) {
            return Ok(true);
        }

        let state = ConnectionState::new();
        let seed = HandlerContext::new(remote.clone(), state.clone()).with_result(true);
        let mut ctx = self.hooks.dispatch(&HookEvent::Connect, &data, seed).await;

        if let Some(failure) = ctx.take_failure() {
            tracing::debug!(node = %self.id, remote = %remote, failure = %failure.name, "Connect hook failed the call");
            return Err(failure);
        }

        let approved = ctx.approved();
        tracing::debug!(node = %self.id, remote = %remote, approved, "Connection request decided");
        if approved {
            // The hooks may have replaced the state handle; keep what they left.
            self.establish(&remote, ctx.state);
        }
        Ok(approved)
    }

    async fn receive_disconnect(&self, remote: PeerId, data: Value) -> Result<bool, RemoteFailure> {
        tracing::debug!(node = %self.id, remote = %remote, "Received disconnect request");
        let Some(state) = self.peers.state(&remote) else {
            return Ok(true);
        };

        let seed = HandlerContext::new(remote.clone(), state).with_result(true);
        let mut ctx = self.hooks.dispatch(&HookEvent::Disconnect, &data, seed).await;

        if let Some(failure) = ctx.take_failure() {
            tracing::debug!(node = %self.id, remote = %remote, failure = %failure.name, "Disconnect hook failed the call");
            return Err(failure);
        }

        let approved = ctx.approved();
        tracing::debug!(node = %self.id, remote = %remote, approved, "Disconnect request decided");
        if approved {
            self.teardown(&remote, TeardownReason::Approved);
        }
        Ok(approved)
    }

    // --- State transitions ---

    /// Disconnected → Connected. No-op if already connected.
    fn establish(&self, remote: &PeerId, state: ConnectionState) -> bool {
        let epoch = self.peers.insert(remote, state, |epoch| {
            self.liveness.enabled.then(|| {
                liveness::spawn_probe(self.me.clone(), remote.clone(), epoch, self.liveness.clone())
            })
        });

        let Some(epoch) = epoch else {
            return false;
        };

        tracing::info!(node = %self.id, remote = %remote, epoch = %epoch, "Connected");
        metrics::record_topology("connect");
        metrics::set_connected_peers(&self.id, self.peers.len());
        self.events.publish(TopologyEvent::Connected(remote.clone()));
        true
    }

    /// Connected → Disconnected. No-op if not connected.
    fn teardown(&self, remote: &PeerId, reason: TeardownReason) -> bool {
        match self.peers.remove(remote) {
            Some(entry) => {
                self.announce_teardown(remote, entry.epoch, reason);
                true
            }
            None => false,
        }
    }

    fn force_disconnect(&self, remote: &PeerId, reason: TeardownReason) -> bool {
        match self.peers.remove(remote) {
            Some(entry) => {
                self.notify_force_disconnect(remote);
                self.announce_teardown(remote, entry.epoch, reason);
                true
            }
            None => false,
        }
    }

    /// Liveness reaction: force-disconnect, but only the connection the probe belongs to.
    pub(crate) fn sever(&self, remote: &PeerId, epoch: ConnectionId) -> bool {
        match self.peers.remove_epoch(remote, epoch) {
            Some(_) => {
                self.notify_force_disconnect(remote);
                self.announce_teardown(remote, epoch, TeardownReason::LivenessLost);
                true
            }
            None => false,
        }
    }

    fn close(&self) -> usize {
        self.transport.remove_handler(CHANNEL);
        let drained = self.peers.drain();
        for (remote, entry) in &drained {
            self.notify_force_disconnect(remote);
            self.announce_teardown(remote, entry.epoch, TeardownReason::Closed);
        }
        tracing::info!(node = %self.id, severed = drained.len(), "Graph node closed");
        drained.len()
    }

    fn announce_teardown(&self, remote: &PeerId, epoch: ConnectionId, reason: TeardownReason) {
        tracing::info!(
            node = %self.id,
            remote = %remote,
            epoch = %epoch,
            reason = reason.as_str(),
            "Disconnected"
        );
        metrics::record_topology("disconnect");
        metrics::record_teardown(reason.as_str());
        metrics::set_connected_peers(&self.id, self.peers.len());
        self.events.publish(TopologyEvent::Disconnected(remote.clone()));
    }

    /// Fire-and-forget notice; the outcome is deliberately ignored.
    fn notify_force_disconnect(&self, remote: &PeerId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(node = %self.id, remote = %remote, "No runtime, skipping force-disconnect notice");
            return;
        };
        let payload = match GraphRequest::ForceDisconnect.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode force-disconnect notice");
                return;
            }
        };

        let transport = self.transport.clone();
        let remote = remote.clone();
        runtime.spawn(async move {
            if let Err(e) = transport.send(&remote, CHANNEL, payload).await {
                tracing::trace!(remote = %remote, error = %e, "Force-disconnect notice not delivered");
            }
        });
    }
}
