//! Dispatch: turns each received message into its local effect.
//!
//! Root: presence announcements update the registry and are forwarded to the
//! bridge; data reports are forwarded to the bridge; a transport-reported
//! disconnect of a known peer is forwarded and the peer forgotten.
//! Non-root: broadcasts drive the indicator.
//! Anything else is logged and dropped.

use std::sync::Arc;

use meshlink_core::{DecodeError, Message, NodeAddress, Role};

use crate::actuator::{Indicator, Level};
use crate::bridge::{Bridge, Channels};
use crate::registry::{NodeRegistry, UpsertResult};

/// What a dispatched message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    PeerAnnounced { upsert: UpsertResult, forwarded: bool },
    DataForwarded { value: i64 },
    PeerDisconnected { logical_id: String },
    IndicatorSet(Level),
    /// Well-formed, but meaningless for this role.
    Ignored { kind: &'static str, role: Role },
    /// Disconnect for an address the registry does not hold.
    UnknownPeer(NodeAddress),
    /// The payload did not decode.
    Discarded(DecodeError),
}

pub struct Dispatcher {
    registry: NodeRegistry,
    bridge: Arc<dyn Bridge>,
    indicator: Arc<dyn Indicator>,
    channels: Channels,
    forward_rejected: bool,
}

impl Dispatcher {
    pub fn new(
        registry: NodeRegistry,
        bridge: Arc<dyn Bridge>,
        indicator: Arc<dyn Indicator>,
        channels: Channels,
    ) -> Self {
        Self {
            registry,
            bridge,
            indicator,
            channels,
            forward_rejected: true,
        }
    }

    /// Whether peers the registry has no room for are still announced on
    /// the connect channel. Defaults to true.
    pub fn with_forward_rejected(mut self, forward: bool) -> Self {
        self.forward_rejected = forward;
        self
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Decode and dispatch one received payload.
    pub fn handle_payload(&mut self, role: Role, from: NodeAddress, payload: &[u8]) -> DispatchOutcome {
        match Message::decode(payload) {
            Ok(message) => self.handle_message(role, from, message),
            Err(e) => {
                tracing::warn!(from = %from, error = %e, "discarding undecodable payload");
                DispatchOutcome::Discarded(e)
            }
        }
    }

    pub fn handle_message(&mut self, role: Role, from: NodeAddress, message: Message) -> DispatchOutcome {
        match (role, message) {
            (
                Role::Root,
                Message::PresenceAnnounce {
                    logical_id,
                    address,
                },
            ) => self.on_presence(from, address, logical_id),
            (Role::Root, Message::DataReport { value }) => {
                tracing::debug!(from = %from, value, "data report");
                self.forward(&Message::DataReport { value });
                DispatchOutcome::DataForwarded { value }
            }
            (Role::NonRoot, Message::Broadcast { sequence }) => {
                let level = Level::from_sequence(sequence);
                tracing::debug!(from = %from, sequence, level = level.as_u8(), "broadcast received");
                self.indicator.set_indicator(level);
                DispatchOutcome::IndicatorSet(level)
            }
            (role, message) => {
                tracing::debug!(from = %from, kind = message.kind(), %role, "ignoring message");
                DispatchOutcome::Ignored {
                    kind: message.kind(),
                    role,
                }
            }
        }
    }

    /// The transport reports `address` has left the mesh.
    pub fn handle_disconnect(&mut self, address: NodeAddress) -> DispatchOutcome {
        let Some(entry) = self.registry.remove(&address) else {
            tracing::trace!(peer = %address, "disconnect for untracked peer");
            return DispatchOutcome::UnknownPeer(address);
        };
        tracing::info!(peer = %address, logical_id = %entry.logical_id, "peer left the mesh");
        self.forward(&Message::DisconnectNotice {
            logical_id: entry.logical_id.clone(),
        });
        DispatchOutcome::PeerDisconnected {
            logical_id: entry.logical_id,
        }
    }

    fn on_presence(&mut self, from: NodeAddress, announced: NodeAddress, logical_id: String) -> DispatchOutcome {
        if announced != from {
            tracing::warn!(
                from = %from,
                announced = %announced,
                "announced address differs from sender, keying on sender"
            );
        }
        let upsert = self.registry.upsert(from, &logical_id);
        match upsert {
            UpsertResult::Inserted => tracing::info!(peer = %from, logical_id = %logical_id, "peer joined"),
            UpsertResult::Updated => {
                tracing::debug!(peer = %from, logical_id = %logical_id, "peer re-announced")
            }
            UpsertResult::CapacityExceeded => tracing::warn!(
                peer = %from,
                logical_id = %logical_id,
                capacity = self.registry.capacity(),
                "registry full, peer not tracked"
            ),
        }

        let forwarded = upsert != UpsertResult::CapacityExceeded || self.forward_rejected;
        if forwarded {
            self.forward(&Message::PresenceAnnounce {
                logical_id,
                address: announced,
            });
        }
        DispatchOutcome::PeerAnnounced { upsert, forwarded }
    }

    /// Publish a message on its bridge channel.
    fn forward(&self, message: &Message) {
        let (channel, payload) = match message {
            Message::PresenceAnnounce { logical_id, .. } => (&self.channels.connect, logical_id.clone()),
            Message::DisconnectNotice { logical_id } => (&self.channels.disconnect, logical_id.clone()),
            Message::DataReport { value } => (&self.channels.data, value.to_string()),
            Message::Broadcast { .. } => return,
        };
        match self.bridge.publish(channel, &payload) {
            Ok(()) => tracing::debug!(channel = %channel, payload = %payload, "published"),
            Err(e) => tracing::warn!(channel = %channel, error = %e, "bridge publish failed"),
        }
    }
}
