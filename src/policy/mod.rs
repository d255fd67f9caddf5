//! Built-in approval policies.
//!
//! # Responsibilities
//! - Cap the number of connected peers
//! - Restrict inbound connects to an allow list
//!
//! # Design Decisions
//! - Policies are plain connect hooks; they compose with user hooks by
//!   registration order like any other hook
//! - A policy that allows only reaffirms the current decision, so it never
//!   overrides a denial made earlier in the chain

use std::collections::HashSet;

use crate::config::PolicyConfig;
use crate::graph::{GraphNode, HookEvent};
use crate::peer::PeerId;

/// Deny inbound connects once `node` holds `max` connections.
///
/// Best-effort and inbound-only. The count is read when the hook runs, so
/// concurrent inbound handshakes may each see room and overshoot the cap,
/// and connects initiated by `node` itself are never limited.
pub fn max_peers(node: &GraphNode, max: usize) {
    let handle = node.downgrade();
    node.register(HookEvent::Connect, move |ctx, _data| {
        let connected = handle.upgrade().map_or(0, |node| node.connections().len());
        Box::pin(async move {
            if connected >= max {
                tracing::info!(remote = %ctx.remote, connected, max, "Peer limit reached, denying connect");
                false
            } else {
                ctx.result.unwrap_or(false)
            }
        })
    });
}

/// Deny inbound connects from identities not in `allowed`.
pub fn allow_list(node: &GraphNode, allowed: impl IntoIterator<Item = PeerId>) {
    let allowed: HashSet<PeerId> = allowed.into_iter().collect();
    node.register(HookEvent::Connect, move |ctx, _data| {
        let permitted = allowed.contains(&ctx.remote);
        Box::pin(async move {
            if !permitted {
                tracing::info!(remote = %ctx.remote, "Peer not on allow list, denying connect");
            }
            permitted && ctx.result.unwrap_or(false)
        })
    });
}

/// Install every policy enabled in `config`.
pub fn install(node: &GraphNode, config: &PolicyConfig) {
    if !config.allow.is_empty() {
        allow_list(node, config.allow.iter().map(PeerId::new));
    }
    if let Some(max) = config.max_peers {
        max_peers(node, max);
    }
}
