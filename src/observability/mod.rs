//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Structured fields (node, remote, epoch) on every transition
//! - Metrics are cheap and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
