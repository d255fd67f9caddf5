//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GraphConfig (validated, immutable)
//!     → handed to startup, nodes and the transport
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GraphConfig;
pub use schema::LivenessConfig;
pub use schema::NodeConfig;
pub use schema::ObservabilityConfig;
pub use schema::PolicyConfig;
pub use schema::TransportConfig;
