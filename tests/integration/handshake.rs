use crate::*;

use meshlink_core::Message;
use meshlink_services::{state_channel, Identity, IdentityError, UpsertResult};

#[test]
fn test_handshake_converges_once_root_is_reachable() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");
    hub.set_down(ROOT, true);

    for _ in 0..3 {
        let tick = node.tick(false);
        assert!(matches!(tick.handshake, Some(Err(_))));
        assert_eq!(tick.next_delay, RETRY);
    }
    assert!(root.pump().is_empty());
    assert!(!node.node_router.is_connected());

    hub.set_down(ROOT, false);
    let tick = node.tick(false);
    assert!(matches!(tick.handshake, Some(Ok(()))));
    assert_eq!(tick.next_delay, POLL);

    for _ in 0..10 {
        assert!(node.tick(false).handshake.is_none());
    }

    assert_eq!(
        root.pump(),
        vec![DispatchOutcome::PeerAnnounced {
            upsert: UpsertResult::Inserted,
            forwarded: true,
        }]
    );
    assert_eq!(root.bridge.published().len(), 1);
}

#[test]
fn test_report_while_root_down_is_dropped() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");
    node.tick(false);
    root.pump();

    hub.set_down(ROOT, true);
    assert!(matches!(node.tick(true).report, Some(Err(_))));
    hub.set_down(ROOT, false);
    node.tick(false);

    assert!(root.pump().is_empty());
    assert_eq!(root.bridge.published().len(), 1);
}

#[test]
fn test_reset_announces_again() {
    let hub = MeshHub::new();
    let mut root = TestNode::join(&hub, Role::Root, ROOT, "root");
    let mut node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");
    node.tick(false);
    node.node_router.reset();
    node.tick(false);

    let announces = root
        .pump()
        .into_iter()
        .filter(|o| matches!(o, DispatchOutcome::PeerAnnounced { .. }))
        .count();
    assert_eq!(announces, 2);
    assert_eq!(root.dispatcher.registry().len(), 1);
}

#[tokio::test]
async fn test_identity_tracks_mesh_events() {
    let hub = MeshHub::new();
    let node = TestNode::join(&hub, Role::NonRoot, node_addr(0x33), "node-7");
    let (state_tx, state_rx) = state_channel();
    let mut identity = Identity::new(node.transport.clone(), state_rx);

    assert_eq!(identity.role(), Role::NonRoot);
    assert_eq!(identity.local_address(), node_addr(0x33));
    assert_eq!(identity.root_address(), Err(IdentityError::NotReady));

    let waiter = tokio::spawn(async move {
        let joined = identity.wait_connected().await;
        (joined, identity)
    });

    for event in [
        MeshEvent::Started,
        MeshEvent::ParentConnected {
            parent: ROOT,
            layer: 2,
        },
        MeshEvent::RootAddress(ROOT),
    ] {
        state_tx.send_modify(|s| {
            s.apply(&event);
        });
    }

    let (joined, identity) = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(joined);
    assert!(identity.is_connected());
    assert_eq!(identity.layer(), Some(2));
    assert_eq!(identity.root_address(), Ok(ROOT));

    // The announcement a node sends carries the address identity reports.
    let message = Message::PresenceAnnounce {
        logical_id: "node-7".into(),
        address: identity.local_address(),
    };
    assert_eq!(Message::decode(&message.encode()), Ok(message));
}
