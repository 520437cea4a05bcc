//! Mesh transport seam.
//!
//! The transport is a best-effort, address-addressable, message-oriented
//! send primitive. Everything it receives, payloads and link events alike,
//! arrives as a [`MeshEvent`] on one channel consumed by the receive loop.

use meshlink_core::{NodeAddress, Role};
use tokio::sync::mpsc;

/// Outbound side of the mesh stack.
pub trait MeshTransport: Send + Sync {
    /// The role the mesh stack currently assigns this node.
    fn role(&self) -> Role;

    /// This device's hardware address.
    fn local_address(&self) -> NodeAddress;

    /// Addresses currently reachable through this node, itself included.
    fn routing_table(&self) -> Vec<NodeAddress>;

    /// Send one payload to one node. Failure is reported, never retried here.
    fn send(&self, dest: &NodeAddress, payload: &[u8]) -> Result<(), TransportError>;
}

/// Link and data events raised by the mesh stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    Started,
    Stopped,
    ParentConnected { parent: NodeAddress, layer: u8 },
    ParentDisconnected { reason: String },
    LayerChanged { layer: u8 },
    /// The mesh now knows the root's address.
    RootAddress(NodeAddress),
    ChildConnected(NodeAddress),
    ChildDisconnected(NodeAddress),
    /// A payload addressed to this node.
    Message { from: NodeAddress, payload: Vec<u8> },
    /// Events with no protocol effect; logged and otherwise ignored.
    Other { name: String },
}

impl MeshEvent {
    pub fn name(&self) -> &str {
        match self {
            MeshEvent::Started => "started",
            MeshEvent::Stopped => "stopped",
            MeshEvent::ParentConnected { .. } => "parent_connected",
            MeshEvent::ParentDisconnected { .. } => "parent_disconnected",
            MeshEvent::LayerChanged { .. } => "layer_changed",
            MeshEvent::RootAddress(_) => "root_address",
            MeshEvent::ChildConnected(_) => "child_connected",
            MeshEvent::ChildDisconnected(_) => "child_disconnected",
            MeshEvent::Message { .. } => "message",
            MeshEvent::Other { name } => name,
        }
    }
}

pub type EventSender = mpsc::Sender<MeshEvent>;
pub type EventReceiver = mpsc::Receiver<MeshEvent>;

/// Default depth of the event channel.
pub const EVENT_CHANNEL_DEPTH: usize = 64;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_DEPTH)
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no route to {0}")]
    NoRoute(NodeAddress),

    #[error("payload length {0} exceeds transport maximum")]
    PayloadTooLarge(usize),

    #[error("mesh is not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
}
