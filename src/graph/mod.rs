//! Connection graph subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (node.rs):
//!     connect / disconnect
//!     → transport round-trip to the remote's node
//!     → approval decision comes back as the response
//!     → local table updated, notification published
//!
//! Inbound (node.rs):
//!     request from sender
//!     → idempotent entry check against table.rs
//!     → approval hooks (crate::hooks)
//!     → table.rs updated, notification published (events.rs)
//!
//! Liveness (liveness.rs):
//!     Per-connection timer
//!     → ping the remote
//!     → first failure severs the connection
//! ```
//!
//! # Design Decisions
//! - One owned node instance per logical participant, no global state
//! - The peer table is the only source of truth for "is connected"
//! - Connection state is handed out by reference, never copied

pub mod events;
pub mod liveness;
pub mod node;
pub mod state;
pub mod table;

pub use events::TopologyEvent;
pub use node::{GraphNode, HookEvent, WeakGraphNode};
pub use state::{ConnectionState, StateMap};
