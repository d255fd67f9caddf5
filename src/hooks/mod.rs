//! Approval hook subsystem.
//!
//! # Data Flow
//! ```text
//! register(event, handler)
//!     → appended to the event's chain (registration order)
//!
//! dispatch(event, data, seed)
//!     → context = globals ⊕ seed
//!     → handler 1 (ctx, data) → ctx.result
//!     → handler 2 (ctx, data) → ctx.result
//!     → ...
//!     → final context (decision + mutated state)
//! ```
//!
//! # Design Decisions
//! - No short-circuit: the last handler in the chain decides
//! - Handlers may suspend; one chain runs strictly sequentially
//! - Chains for different events or peers may overlap freely

pub mod context;
pub mod dispatcher;

pub use context::HandlerContext;
pub use dispatcher::{Hook, HookDispatcher};
