//! In-memory mesh hub.
//!
//! Every node that joins the hub gets a transport whose sends land as
//! `MeshEvent::Message` on the destination's event channel. Nodes can be
//! taken down (sends to them fail) and removed (the root is told the child
//! left).

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use meshlink_core::{NodeAddress, Role};
use meshlink_services::{
    event_channel, EventReceiver, EventSender, MeshEvent, MeshTransport, TransportError,
};

#[derive(Default)]
pub struct MeshHub {
    nodes: Mutex<BTreeMap<NodeAddress, (Role, EventSender)>>,
    down: Mutex<HashSet<NodeAddress>>,
}

impl MeshHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn join(self: &Arc<Self>, role: Role, local: NodeAddress) -> (Arc<HubTransport>, EventReceiver) {
        let (tx, rx) = event_channel();
        self.nodes.lock().unwrap().insert(local, (role, tx));
        let transport = Arc::new(HubTransport {
            hub: self.clone(),
            role,
            local,
        });
        (transport, rx)
    }

    /// Remove `address` and tell every root it is gone.
    pub fn leave(&self, address: NodeAddress) {
        let mut nodes = self.nodes.lock().unwrap();
        nodes.remove(&address);
        for (role, tx) in nodes.values() {
            if role.is_root() {
                tx.try_send(MeshEvent::ChildDisconnected(address)).unwrap();
            }
        }
    }

    /// While down, sends addressed to `address` fail with `NotConnected`.
    pub fn set_down(&self, address: NodeAddress, down: bool) {
        let mut set = self.down.lock().unwrap();
        if down {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }

    fn addresses(&self) -> Vec<NodeAddress> {
        self.nodes.lock().unwrap().keys().copied().collect()
    }

    fn deliver(&self, from: NodeAddress, dest: &NodeAddress, payload: &[u8]) -> Result<(), TransportError> {
        if self.down.lock().unwrap().contains(dest) {
            return Err(TransportError::NotConnected);
        }
        let nodes = self.nodes.lock().unwrap();
        let (_, tx) = nodes.get(dest).ok_or(TransportError::NoRoute(*dest))?;
        tx.try_send(MeshEvent::Message {
            from,
            payload: payload.to_vec(),
        })
        .map_err(|_| TransportError::NotConnected)
    }
}

pub struct HubTransport {
    hub: Arc<MeshHub>,
    role: Role,
    local: NodeAddress,
}

impl MeshTransport for HubTransport {
    fn role(&self) -> Role {
        self.role
    }

    fn local_address(&self) -> NodeAddress {
        self.local
    }

    /// Self first, then every other node on the hub.
    fn routing_table(&self) -> Vec<NodeAddress> {
        let mut table = vec![self.local];
        table.extend(self.hub.addresses().into_iter().filter(|a| *a != self.local));
        table
    }

    fn send(&self, dest: &NodeAddress, payload: &[u8]) -> Result<(), TransportError> {
        self.hub.deliver(self.local, dest, payload)
    }
}
