//! Passive topology notifications.

use tokio::sync::broadcast;

use crate::peer::PeerId;

/// Buffered notifications per subscriber before it starts lagging.
pub const EVENT_CAPACITY: usize = 256;

/// A completed topology change, as seen by the local node.
///
/// Fired exactly once per establish or teardown; denied attempts fire
/// nothing. Observers cannot veto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    Connected(PeerId),
    Disconnected(PeerId),
}

impl TopologyEvent {
    pub fn remote(&self) -> &PeerId {
        match self {
            TopologyEvent::Connected(remote) | TopologyEvent::Disconnected(remote) => remote,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TopologyEvent::Connected(_) => "connect",
            TopologyEvent::Disconnected(_) => "disconnect",
        }
    }
}

/// Fan-out of topology events to any number of subscribers.
pub(crate) struct EventBus {
    tx: broadcast::Sender<TopologyEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is fine.
    pub(crate) fn publish(&self, event: TopologyEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::new();
        bus.publish(TopologyEvent::Connected(PeerId::new("lost")));

        let mut rx = bus.subscribe();
        bus.publish(TopologyEvent::Connected(PeerId::new("a")));
        bus.publish(TopologyEvent::Disconnected(PeerId::new("a")));

        let first = rx.recv().await.unwrap();
        assert_eq!(first, TopologyEvent::Connected(PeerId::new("a")));
        assert_eq!(first.kind(), "connect");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.remote(), &PeerId::new("a"));
        assert_eq!(second.kind(), "disconnect");
    }
}
