use crate::*;

use meshlink_services::UpsertResult;

#[test]
fn test_node_joins_and_root_bridges_connect() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");

    let tick = node.tick(false);
    assert!(matches!(tick.handshake, Some(Ok(()))));

    let outcomes = root.pump();
    assert_eq!(
        outcomes,
        vec![DispatchOutcome::PeerAnnounced {
            upsert: UpsertResult::Inserted,
            forwarded: true,
        }]
    );

    let registry = root.dispatcher.registry();
    assert_eq!(registry.len(), 1);
    let entry = registry.find_by_address(&node_addr(0x33)).unwrap();
    assert_eq!(entry.logical_id, "node-7");
    assert_eq!(entry.address.canonical(), "aa11bb22cc33");

    assert_eq!(
        root.bridge.published(),
        vec![("ESP-connect".to_string(), "node-7".to_string())]
    );
}

#[test]
fn test_data_report_reaches_bridge() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");

    node.tick(false);
    root.pump();

    let tick = node.tick(true);
    assert!(tick.handshake.is_none());
    assert!(matches!(tick.report, Some(Ok(()))));

    assert_eq!(root.pump(), vec![DispatchOutcome::DataForwarded { value: 156 }]);
    assert_eq!(
        root.bridge.published().last().unwrap(),
        &("ESP-send".to_string(), "156".to_string())
    );
}

#[test]
fn test_departed_node_is_bridged_and_forgotten() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");

    node.tick(false);
    root.pump();
    assert_eq!(root.dispatcher.registry().len(), 1);

    hub.leave(node_addr(0x33));
    assert_eq!(
        root.pump(),
        vec![DispatchOutcome::PeerDisconnected {
            logical_id: "node-7".into()
        }]
    );
    assert!(root.dispatcher.registry().is_empty());
    assert_eq!(
        root.bridge.published().last().unwrap(),
        &("ESP-disconnect".to_string(), "node-7".to_string())
    );

    // A second departure of the same address is not bridged again.
    hub.leave(node_addr(0x33));
    assert_eq!(root.pump(), vec![DispatchOutcome::UnknownPeer(node_addr(0x33))]);
    assert_eq!(root.bridge.published().len(), 2);
}

#[test]
fn test_full_registry_still_bridges_new_nodes() {
    let hub = MeshHub::new();
    let mut root = TestNode::join_with_capacity(&hub, Role::Root, ROOT, "root", 3);
    let mut nodes: Vec<TestNode> = (1..=4)
        .map(|i| TestNode::join(&hub, Role::NonRoot, node_addr(i), &format!("node-{i}")))
        .collect();

    for node in &mut nodes {
        node.tick(false);
    }
    let outcomes = root.pump();

    assert_eq!(outcomes.len(), 4);
    assert_eq!(
        outcomes[3],
        DispatchOutcome::PeerAnnounced {
            upsert: UpsertResult::CapacityExceeded,
            forwarded: true,
        }
    );
    assert_eq!(root.dispatcher.registry().len(), 3);
    assert!(root.dispatcher.registry().find_by_address(&node_addr(4)).is_none());
    assert_eq!(root.bridge.published().len(), 4);
}

#[test]
fn test_reannounce_updates_logical_id() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");
    node.tick(false);
    root.pump();

    // Same device restarts with a new id and handshakes again.
    let mut restarted = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-8");
    restarted.tick(false);
    assert_eq!(
        root.pump(),
        vec![DispatchOutcome::PeerAnnounced {
            upsert: UpsertResult::Updated,
            forwarded: true,
        }]
    );
    assert_eq!(root.dispatcher.registry().len(), 1);
    assert_eq!(
        root.dispatcher
            .registry()
            .find_by_address(&node_addr(0x33))
            .unwrap()
            .logical_id,
        "node-8"
    );
}
