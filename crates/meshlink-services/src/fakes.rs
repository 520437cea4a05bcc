//! Recording fakes for the collaborator traits.
//!
//! Compiled for this crate's tests and for downstream crates that enable
//! the `testkit` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use meshlink_core::{Message, NodeAddress, Role};

use crate::actuator::{Indicator, Level, Trigger};
use crate::bridge::{Bridge, BridgeError};
use crate::transport::{MeshTransport, TransportError};

/// Transport that records every send and fails on request.
pub struct RecordingTransport {
    role: Mutex<Role>,
    local: NodeAddress,
    table: Mutex<Vec<NodeAddress>>,
    sent: Mutex<Vec<(NodeAddress, Vec<u8>)>>,
    fail_next: AtomicUsize,
    unreachable: Mutex<HashSet<NodeAddress>>,
}

impl RecordingTransport {
    pub fn new(role: Role, local: NodeAddress) -> Self {
        Self {
            role: Mutex::new(role),
            local,
            table: Mutex::new(vec![local]),
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            unreachable: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_role(&self, role: Role) {
        *self.role.lock().unwrap() = role;
    }

    pub fn set_routing_table(&self, table: Vec<NodeAddress>) {
        *self.table.lock().unwrap() = table;
    }

    /// Fail the next `n` sends, whatever their destination.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every send to `address`.
    pub fn make_unreachable(&self, address: NodeAddress) {
        self.unreachable.lock().unwrap().insert(address);
    }

    /// Successful sends, in order.
    pub fn sent(&self) -> Vec<(NodeAddress, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Successful sends, decoded.
    pub fn sent_messages(&self) -> Vec<(NodeAddress, Message)> {
        self.sent()
            .into_iter()
            .filter_map(|(dest, bytes)| Message::decode(&bytes).ok().map(|m| (dest, m)))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl MeshTransport for RecordingTransport {
    fn role(&self) -> Role {
        *self.role.lock().unwrap()
    }

    fn local_address(&self) -> NodeAddress {
        self.local
    }

    fn routing_table(&self) -> Vec<NodeAddress> {
        self.table.lock().unwrap().clone()
    }

    fn send(&self, dest: &NodeAddress, payload: &[u8]) -> Result<(), TransportError> {
        let pending = self.fail_next.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_next.store(pending - 1, Ordering::SeqCst);
            return Err(TransportError::NotConnected);
        }
        if self.unreachable.lock().unwrap().contains(dest) {
            return Err(TransportError::NoRoute(*dest));
        }
        self.sent.lock().unwrap().push((*dest, payload.to_vec()));
        Ok(())
    }
}

/// Bridge that records every publish.
#[derive(Default)]
pub struct RecordingBridge {
    published: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

impl Bridge for RecordingBridge {
    fn publish(&self, channel: &str, payload: &str) -> Result<(), BridgeError> {
        if *self.failing.lock().unwrap() {
            return Err(BridgeError::NotConnected);
        }
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Indicator that records every level it is driven to.
#[derive(Default)]
pub struct RecordingIndicator {
    levels: Mutex<Vec<Level>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<Level> {
        self.levels.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Level> {
        self.levels.lock().unwrap().last().copied()
    }
}

impl Indicator for RecordingIndicator {
    fn set_indicator(&self, level: Level) {
        self.levels.lock().unwrap().push(level);
    }
}

/// Trigger that fires once per queued press.
#[derive(Default)]
pub struct ScriptedTrigger {
    presses: AtomicUsize,
}

impl ScriptedTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
    }
}

impl Trigger for ScriptedTrigger {
    fn read_trigger(&self) -> bool {
        self.presses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
