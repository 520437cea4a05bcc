//! meshlink integration test harness.
//!
//! Whole meshes of nodes run in one process over the in-memory hub in
//! `infra.rs`. Each `TestNode` wires the real dispatcher and routers to
//! recording bridge/indicator fakes; `pump()` plays the receive loop and
//! `tick()` plays the transmit loop, so scenarios step deterministically.
//!
//!   cargo test --test integration

use std::sync::Arc;
use std::time::Duration;

use meshlink_core::{NodeAddress, Role};
use meshlink_services::fakes::{RecordingBridge, RecordingIndicator};
use meshlink_services::{
    Channels, DispatchOutcome, Dispatcher, EventReceiver, MeshEvent, MeshTransport, NodeRegistry,
    NodeRouter, RootRouter, TickReport,
};

mod broadcast;
mod handshake;
mod infra;
mod presence;

pub use infra::{HubTransport, MeshHub};

// ── Harness ───────────────────────────────────────────────────────────────────

pub const ROOT: NodeAddress = NodeAddress::new([0xaa, 0x11, 0xbb, 0x22, 0xcc, 0x00]);

pub fn node_addr(last: u8) -> NodeAddress {
    NodeAddress::new([0xaa, 0x11, 0xbb, 0x22, 0xcc, last])
}

pub const POLL: Duration = Duration::from_millis(300);
pub const RETRY: Duration = Duration::from_millis(500);

pub struct TestNode {
    pub transport: Arc<HubTransport>,
    pub events: EventReceiver,
    pub dispatcher: Dispatcher,
    pub bridge: Arc<RecordingBridge>,
    pub indicator: Arc<RecordingIndicator>,
    pub root_router: RootRouter,
    pub node_router: NodeRouter,
}

impl TestNode {
    pub fn join(hub: &Arc<MeshHub>, role: Role, address: NodeAddress, logical_id: &str) -> Self {
        Self::join_with_capacity(hub, role, address, logical_id, 30)
    }

    pub fn join_with_capacity(
        hub: &Arc<MeshHub>,
        role: Role,
        address: NodeAddress,
        logical_id: &str,
        capacity: usize,
    ) -> Self {
        let (transport, events) = hub.join(role, address);
        let bridge = Arc::new(RecordingBridge::new());
        let indicator = Arc::new(RecordingIndicator::new());
        let dispatcher = Dispatcher::new(
            NodeRegistry::with_capacity(capacity),
            bridge.clone(),
            indicator.clone(),
            Channels::default(),
        );
        Self {
            transport,
            events,
            dispatcher,
            bridge,
            indicator,
            root_router: RootRouter::new(),
            node_router: NodeRouter::new(logical_id, 156, POLL, RETRY),
        }
    }

    /// Drain every pending event through the dispatcher.
    pub fn pump(&mut self) -> Vec<DispatchOutcome> {
        let role = self.transport.role();
        let mut outcomes = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                MeshEvent::Message { from, payload } => {
                    outcomes.push(self.dispatcher.handle_payload(role, from, &payload));
                }
                MeshEvent::ChildDisconnected(address) => {
                    outcomes.push(self.dispatcher.handle_disconnect(address));
                }
                _ => {}
            }
        }
        outcomes
    }

    /// One non-root transmit tick toward `ROOT`.
    pub fn tick(&mut self, triggered: bool) -> TickReport {
        self.node_router
            .tick(self.transport.as_ref(), ROOT, triggered)
    }

    /// One root trigger: fan the next broadcast out.
    pub fn trigger_broadcast(&mut self) -> meshlink_services::FanOutReport {
        self.root_router.fan_out(self.transport.as_ref(), 50)
    }
}
