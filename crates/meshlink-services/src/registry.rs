//! Node registry: the root's table of non-root peers it has heard announce.
//!
//! Owned by the root's dispatcher and mutated only from the receive path.
//! Entries are keyed by hardware address; the logical identifier is copied
//! into registry-owned storage on every upsert and overwritten in place when
//! a peer re-announces.

use meshlink_core::NodeAddress;

/// Default maximum number of tracked peers.
pub const DEFAULT_CAPACITY: usize = 30;

/// One non-root peer known to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub address: NodeAddress,
    pub logical_id: String,
}

/// Result of [`NodeRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    /// A new entry was appended.
    Inserted,
    /// An entry for this address existed; its logical id was overwritten.
    Updated,
    /// The address is new and the registry is full. Nothing changed.
    CapacityExceeded,
}

/// Capacity-bounded, insertion-ordered peer table.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    entries: Vec<PeerEntry>,
    capacity: usize,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert or update the entry for `address`.
    pub fn upsert(&mut self, address: NodeAddress, logical_id: &str) -> UpsertResult {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.address == address) {
            entry.logical_id.clear();
            entry.logical_id.push_str(logical_id);
            return UpsertResult::Updated;
        }
        if self.is_full() {
            return UpsertResult::CapacityExceeded;
        }
        self.entries.push(PeerEntry {
            address,
            logical_id: logical_id.to_owned(),
        });
        UpsertResult::Inserted
    }

    pub fn find_by_address(&self, address: &NodeAddress) -> Option<&PeerEntry> {
        self.entries.iter().find(|e| e.address == *address)
    }

    /// Remove and return the entry for `address`, keeping the order of the rest.
    pub fn remove(&mut self, address: &NodeAddress) -> Option<PeerEntry> {
        let index = self.entries.iter().position(|e| e.address == *address)?;
        Some(self.entries.remove(index))
    }

    /// Entries in insertion order. Each call starts a fresh pass.
    pub fn all(&self) -> impl Iterator<Item = &PeerEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}
