//! Forced teardown and liveness probing.

use std::time::Duration;

use serde_json::Value;

use swarm_graph::config::LivenessConfig;
use swarm_graph::{GraphNode, HookEvent, TopologyEvent};

mod common;
use common::{
    drain_events, eventually, fast_liveness, network, no_liveness, node, peer, CountingTransport,
    PROBE_INTERVAL_MS,
};

fn intervals(n: u64) -> Duration {
    Duration::from_millis(PROBE_INTERVAL_MS * n)
}

#[tokio::test]
async fn healthy_connection_survives_probing() {
    let net = network();
    let a = node(&net, "a");
    let b = node(&net, "b");

    assert!(a.connect(&peer("b"), Value::Null).await);
    tokio::time::sleep(intervals(6)).await;

    assert!(a.is_connected(&peer("b")));
    assert!(b.is_connected(&peer("a")));
}

#[tokio::test]
async fn force_disconnect_bypasses_hooks_and_notifies_remote() {
    let net = network();
    let a = node(&net, "a");
    // Remote probing off, so only the notice can drop the link on b.
    let b = GraphNode::new(net.endpoint("b"), no_liveness());
    a.register(HookEvent::Disconnect, |_ctx, _data| Box::pin(async { false }));
    b.register(HookEvent::Disconnect, |_ctx, _data| Box::pin(async { false }));

    assert!(a.connect(&peer("b"), Value::Null).await);
    let mut a_events = a.subscribe();
    let mut b_events = b.subscribe();

    assert!(a.force_disconnect(&peer("b")));
    assert!(!a.is_connected(&peer("b")));
    assert!(eventually(intervals(4), || !b.is_connected(&peer("a"))).await);

    assert_eq!(drain_events(&mut a_events).await, vec![TopologyEvent::Disconnected(peer("b"))]);
    assert_eq!(drain_events(&mut b_events).await, vec![TopologyEvent::Disconnected(peer("a"))]);
}

#[tokio::test]
async fn force_disconnect_without_connection_is_false() {
    let net = network();
    let a = node(&net, "a");
    let _b = node(&net, "b");
    let mut events = a.subscribe();

    assert!(!a.force_disconnect(&peer("b")));
    assert!(drain_events(&mut events).await.is_empty());
}

#[tokio::test]
async fn departed_remote_is_severed_once() {
    let net = network();
    let a = node(&net, "a");
    let _b = node(&net, "b");

    assert!(a.connect(&peer("b"), Value::Null).await);
    let mut events = a.subscribe();

    assert!(net.close(&peer("b")));
    assert!(eventually(intervals(6), || !a.is_connected(&peer("b"))).await);

    // Give a duplicate timer the chance to misfire.
    tokio::time::sleep(intervals(4)).await;
    assert_eq!(drain_events(&mut events).await, vec![TopologyEvent::Disconnected(peer("b"))]);
}

#[tokio::test]
async fn frozen_remote_is_severed_on_both_sides() {
    let net = network();
    let a = node(&net, "a");
    let b = node(&net, "b");

    assert!(a.connect(&peer("b"), Value::Null).await);
    assert!(net.set_suspended(&peer("b"), true));

    assert!(eventually(intervals(8), || !a.is_connected(&peer("b"))).await);
    // b's own pings cannot get out either.
    assert!(eventually(intervals(8), || !b.is_connected(&peer("a"))).await);
}

#[tokio::test]
async fn remote_that_forgot_us_is_severed() {
    let net = network();
    let slow = LivenessConfig {
        enabled: true,
        interval_ms: 300,
        timeout_ms: 100,
    };
    let a = GraphNode::new(net.endpoint("a"), slow);
    let b = GraphNode::new(net.endpoint("b"), no_liveness());

    assert!(a.connect(&peer("b"), Value::Null).await);
    // Only b's side goes away; the notice is swallowed while a is frozen,
    // and a's first probe is not due yet.
    net.set_suspended(&peer("a"), true);
    assert!(b.force_disconnect(&peer("a")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    net.set_suspended(&peer("a"), false);
    assert!(a.is_connected(&peer("b")));

    // a's first ping is answered with "not connected".
    assert!(eventually(Duration::from_millis(600), || !a.is_connected(&peer("b"))).await);
}

#[tokio::test]
async fn disconnect_from_unreachable_remote_tears_down_locally() {
    let net = network();
    let a = GraphNode::new(net.endpoint("a"), no_liveness());
    let _b = node(&net, "b");

    assert!(a.connect(&peer("b"), Value::Null).await);
    let mut events = a.subscribe();
    net.close(&peer("b"));

    assert!(a.disconnect(&peer("b"), Value::Null).await);
    assert!(a.connections().is_empty());
    assert_eq!(drain_events(&mut events).await, vec![TopologyEvent::Disconnected(peer("b"))]);
}

#[tokio::test]
async fn disconnect_from_frozen_remote_tears_down_after_timeout() {
    let net = network();
    let a = GraphNode::new(net.endpoint("a"), no_liveness());
    let _b = GraphNode::new(net.endpoint("b"), no_liveness());

    assert!(a.connect(&peer("b"), Value::Null).await);
    net.set_suspended(&peer("b"), true);

    assert!(a.disconnect(&peer("b"), Value::Null).await);
    assert!(!a.is_connected(&peer("b")));
}

#[tokio::test]
async fn probe_stops_with_its_connection() {
    let net = network();
    let (transport, pings) = CountingTransport::new(net.endpoint("a"));
    let a = GraphNode::new(transport, fast_liveness());
    let _b = node(&net, "b");

    assert!(a.connect(&peer("b"), Value::Null).await);
    tokio::time::sleep(intervals(4)).await;
    assert!(pings.count() > 0);

    assert!(a.disconnect(&peer("b"), Value::Null).await);
    let at_teardown = pings.count();
    tokio::time::sleep(intervals(5)).await;
    assert_eq!(pings.count(), at_teardown);
}

#[tokio::test]
async fn reconnecting_keeps_a_single_probe() {
    let net = network();
    let (transport, pings) = CountingTransport::new(net.endpoint("a"));
    let a = GraphNode::new(transport, fast_liveness());
    let _b = node(&net, "b");

    for _ in 0..3 {
        assert!(a.connect(&peer("b"), Value::Null).await);
        assert!(a.disconnect(&peer("b"), Value::Null).await);
    }
    assert!(a.connect(&peer("b"), Value::Null).await);
    // Repeat connects on a live link must not start another probe.
    assert!(a.connect(&peer("b"), Value::Null).await);

    let before = pings.count();
    tokio::time::sleep(intervals(10)).await;
    let sent = pings.count() - before;
    assert!(sent >= 5, "probe stalled: {sent} pings");
    assert!(sent <= 12, "more than one probe running: {sent} pings");
}

#[tokio::test]
async fn close_severs_every_connection() {
    let net = network();
    let a = node(&net, "a");
    let b = GraphNode::new(net.endpoint("b"), no_liveness());
    let c = GraphNode::new(net.endpoint("c"), no_liveness());

    assert!(a.connect(&peer("b"), Value::Null).await);
    assert!(c.connect(&peer("a"), Value::Null).await);
    let mut events = a.subscribe();

    assert_eq!(a.close(), 2);
    assert!(a.connections().is_empty());
    assert_eq!(drain_events(&mut events).await.len(), 2);

    assert!(eventually(intervals(4), || !b.is_connected(&peer("a"))).await);
    assert!(eventually(intervals(4), || !c.is_connected(&peer("a"))).await);

    // A closed node no longer answers.
    assert!(!b.connect(&peer("a"), Value::Null).await);
}
