//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → transport → nodes + policies → configured links
//!
//! Shutdown (shutdown.rs):
//!     Signal received → observers stop → every node closed
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Every node is up before any link is requested
//! - Closing a node severs its links, so peers see the departure at once
//!   instead of waiting for their liveness probes

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
