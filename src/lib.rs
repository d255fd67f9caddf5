//! Pairwise connection graph over a request/response transport.
//!
//! Nodes run a symmetric connect/disconnect handshake that either side can
//! veto through ordered approval hooks, keep per-connection state, detect
//! silent peer loss with periodic liveness probes, and publish topology
//! changes to passive observers.

pub mod config;
pub mod graph;
pub mod hooks;
pub mod lifecycle;
pub mod observability;
pub mod peer;
pub mod policy;
pub mod transport;

pub use config::GraphConfig;
pub use graph::{ConnectionState, GraphNode, HookEvent, StateMap, TopologyEvent};
pub use hooks::HandlerContext;
pub use lifecycle::Shutdown;
pub use peer::PeerId;
pub use transport::{MemoryNetwork, Transport, TransportError};
