//! Identity: who this node is and where the root is.
//!
//! Role and local address come straight from the transport. Mesh state
//! that only events can tell us (parent link, layer, root address) lives in
//! a [`MeshState`] published by the receive loop over a watch channel, so
//! the transmit side reads it without sharing anything mutable.

use std::sync::Arc;

use meshlink_core::{NodeAddress, Role};
use tokio::sync::watch;

use crate::transport::{MeshEvent, MeshTransport};

/// Link state accumulated from mesh events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshState {
    /// Connected to a parent (or, on the root, the mesh has formed).
    pub connected: bool,
    pub layer: Option<u8>,
    pub parent: Option<NodeAddress>,
    pub root: Option<NodeAddress>,
}

impl MeshState {
    /// Fold one event into the state. Returns true if anything changed.
    pub fn apply(&mut self, event: &MeshEvent) -> bool {
        let before = self.clone();
        match event {
            MeshEvent::Started | MeshEvent::Stopped => {
                self.connected = false;
                self.parent = None;
            }
            MeshEvent::ParentConnected { parent, layer } => {
                self.connected = true;
                self.parent = Some(*parent);
                self.layer = Some(*layer);
            }
            MeshEvent::ParentDisconnected { .. } => {
                self.connected = false;
                self.parent = None;
            }
            MeshEvent::LayerChanged { layer } => self.layer = Some(*layer),
            MeshEvent::RootAddress(root) => self.root = Some(*root),
            MeshEvent::ChildConnected(_)
            | MeshEvent::ChildDisconnected(_)
            | MeshEvent::Message { .. }
            | MeshEvent::Other { .. } => {}
        }
        *self != before
    }
}

pub type StateSender = watch::Sender<MeshState>;
pub type StateReceiver = watch::Receiver<MeshState>;

pub fn state_channel() -> (StateSender, StateReceiver) {
    watch::channel(MeshState::default())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("root address not yet known")]
    NotReady,
}

/// Read-only view of this node's identity.
#[derive(Clone)]
pub struct Identity {
    transport: Arc<dyn MeshTransport>,
    state: StateReceiver,
}

impl Identity {
    pub fn new(transport: Arc<dyn MeshTransport>, state: StateReceiver) -> Self {
        Self { transport, state }
    }

    pub fn role(&self) -> Role {
        self.transport.role()
    }

    pub fn local_address(&self) -> NodeAddress {
        self.transport.local_address()
    }

    /// Fails with `NotReady` until a root address event has been seen.
    pub fn root_address(&self) -> Result<NodeAddress, IdentityError> {
        self.state.borrow().root.ok_or(IdentityError::NotReady)
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn layer(&self) -> Option<u8> {
        self.state.borrow().layer
    }

    /// Resolve once the node has joined the mesh.
    /// Returns false if the state publisher is gone.
    pub async fn wait_connected(&mut self) -> bool {
        self.state.wait_for(|s| s.connected).await.is_ok()
    }
}
