use crate::*;

use meshlink_core::Message;
use meshlink_services::Level;

#[test]
fn test_broadcast_reaches_every_node_but_root() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut nodes: Vec<TestNode> = (1..=3)
        .map(|i| TestNode::join(&hub, Role::NonRoot, node_addr(i), &format!("node-{i}")))
        .collect();

    let report = root.trigger_broadcast();
    assert_eq!(report.sequence, 1);
    assert_eq!(report.sent, vec![node_addr(1), node_addr(2), node_addr(3)]);
    assert!(report.failed.is_empty());

    // Nothing looped back to the root.
    assert!(root.pump().is_empty());

    for node in &mut nodes {
        assert_eq!(node.pump(), vec![DispatchOutcome::IndicatorSet(Level::High)]);
        assert_eq!(node.indicator.last(), Some(Level::High));
    }
}

#[test]
fn test_indicator_follows_sequence_parity() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(1), "node-1");

    for _ in 0..4 {
        root.trigger_broadcast();
        node.pump();
    }
    assert_eq!(
        node.indicator.levels(),
        vec![Level::High, Level::Low, Level::High, Level::Low]
    );
}

#[test]
fn test_explicit_sequences_drive_indicator() {
    let hub = MeshHub::new();
    let root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(1), "node-1");

    root.transport
        .send(&node_addr(1), &Message::Broadcast { sequence: 5 }.encode())
        .unwrap();
    node.pump();
    assert_eq!(node.indicator.last(), Some(Level::High));

    root.transport
        .send(&node_addr(1), &Message::Broadcast { sequence: 4 }.encode())
        .unwrap();
    node.pump();
    assert_eq!(node.indicator.last(), Some(Level::Low));

    // Legacy bare counter with trailing NUL.
    root.transport.send(&node_addr(1), b"7\0").unwrap();
    node.pump();
    assert_eq!(node.indicator.last(), Some(Level::High));
}

#[test]
fn test_unreachable_node_does_not_stop_fan_out() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut nodes: Vec<TestNode> = (1..=3)
        .map(|i| TestNode::join(&hub, Role::NonRoot, node_addr(i), &format!("node-{i}")))
        .collect();
    hub.set_down(node_addr(2), true);

    let report = root.trigger_broadcast();
    assert_eq!(report.sent, vec![node_addr(1), node_addr(3)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, node_addr(2));

    assert_eq!(nodes[0].pump().len(), 1);
    assert!(nodes[1].pump().is_empty());
    assert_eq!(nodes[2].pump().len(), 1);
}

#[test]
fn test_root_ignores_broadcasts_and_nodes_ignore_reports() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(1), "node-1");

    node.transport
        .send(&ROOT, &Message::Broadcast { sequence: 1 }.encode())
        .unwrap();
    root.transport
        .send(&node_addr(1), &Message::DataReport { value: 156 }.encode())
        .unwrap();

    assert!(matches!(root.pump().as_slice(), [DispatchOutcome::Ignored { .. }]));
    assert!(matches!(node.pump().as_slice(), [DispatchOutcome::Ignored { .. }]));
    assert!(root.indicator.levels().is_empty());
    assert!(root.bridge.published().is_empty());
    assert!(node.bridge.published().is_empty());
}
