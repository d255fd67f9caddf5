//! Liveness probing of established connections.
//!
//! # Responsibilities
//! - Ping each connected peer at a fixed period
//! - Sever the connection on the first failed probe
//!
//! # Design Decisions
//! - One probe task per connection, owned by its peer table entry
//! - Any failure counts: timeout, "not connected", or transport error
//! - No backoff, no jitter, no retry
//! - The task holds only a weak node handle and its connection epoch, so it
//!   never keeps a node alive and never severs a newer connection

use std::sync::Weak;

use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::LivenessConfig;
use crate::graph::node::NodeInner;
use crate::observability::metrics;
use crate::peer::{ConnectionId, PeerId};
use crate::transport::protocol::GraphRequest;

/// Cancels its probe task when dropped.
#[derive(Debug)]
pub(crate) struct LivenessHandle {
    task: AbortHandle,
}

impl Drop for LivenessHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start probing `remote` for the connection identified by `epoch`.
///
/// The first ping goes out one full period after establishment.
pub(crate) fn spawn_probe(
    node: Weak<NodeInner>,
    remote: PeerId,
    epoch: ConnectionId,
    config: LivenessConfig,
) -> LivenessHandle {
    let task = tokio::spawn(probe_loop(node, remote, epoch, config));
    LivenessHandle {
        task: task.abort_handle(),
    }
}

async fn probe_loop(node: Weak<NodeInner>, remote: PeerId, epoch: ConnectionId, config: LivenessConfig) {
    let period = config.interval();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(node) = node.upgrade() else {
            return;
        };

        let failure = match time::timeout(config.timeout(), node.send_request(&remote, GraphRequest::Ping)).await {
            Ok(Ok(_)) => {
                tracing::trace!(node = %node.id(), remote = %remote, epoch = %epoch, "Ping answered");
                continue;
            }
            Ok(Err(e)) if e.is_not_connected() => "remote no longer connected".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no answer within {} ms", config.timeout_ms),
        };

        tracing::warn!(
            node = %node.id(),
            remote = %remote,
            epoch = %epoch,
            reason = %failure,
            "Liveness probe failed, severing connection"
        );
        metrics::record_liveness_failure();
        node.sever(&remote, epoch);
        return;
    }
}
