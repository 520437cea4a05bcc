//! Routing: what to send, and to whom, on each transmit tick.
//!
//! The root fans a local trigger out to every address in the transport's
//! current routing table except its own. A non-root announces itself to the
//! root until one announcement is accepted by the transport, and sends a
//! data report to the root on each trigger.

use std::time::Duration;

use meshlink_core::{Message, NodeAddress};

use crate::transport::{MeshTransport, TransportError};

// ── Root ──────────────────────────────────────────────────────────────────────

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub sequence: u32,
    pub sent: Vec<NodeAddress>,
    pub failed: Vec<(NodeAddress, TransportError)>,
}

/// Root-side broadcast state: only the sequence counter.
#[derive(Debug, Default)]
pub struct RootRouter {
    sequence: u32,
}

impl RootRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence carried by the most recent broadcast. 0 before the first.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Send the next broadcast to every peer in a fresh routing-table
    /// snapshot, at most `max_peers` of it. A failed send does not stop
    /// the rest.
    pub fn fan_out(&mut self, transport: &dyn MeshTransport, max_peers: usize) -> FanOutReport {
        self.sequence = self.sequence.wrapping_add(1);
        let payload = Message::Broadcast {
            sequence: self.sequence,
        }
        .encode();
        let local = transport.local_address();

        let mut report = FanOutReport {
            sequence: self.sequence,
            ..FanOutReport::default()
        };
        for peer in transport.routing_table().into_iter().take(max_peers) {
            if peer == local {
                continue;
            }
            match transport.send(&peer, &payload) {
                Ok(()) => {
                    tracing::debug!(peer = %peer, sequence = self.sequence, "broadcast sent");
                    report.sent.push(peer);
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "broadcast send failed");
                    report.failed.push((peer, e));
                }
            }
        }
        report
    }
}

// ── Non-root ──────────────────────────────────────────────────────────────────

/// Outcome of one non-root tick.
#[derive(Debug)]
pub struct TickReport {
    /// Set when a presence announcement was attempted this tick.
    pub handshake: Option<Result<(), TransportError>>,
    /// Set when the trigger fired and a data report was attempted.
    pub report: Option<Result<(), TransportError>>,
    /// How long the transmit loop should wait before the next tick.
    pub next_delay: Duration,
}

/// Non-root state: the handshake flag plus what to announce and report.
#[derive(Debug)]
pub struct NodeRouter {
    logical_id: String,
    report_value: i64,
    poll_period: Duration,
    handshake_retry: Duration,
    connected: bool,
}

impl NodeRouter {
    pub fn new(
        logical_id: impl Into<String>,
        report_value: i64,
        poll_period: Duration,
        handshake_retry: Duration,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            report_value,
            poll_period,
            handshake_retry,
            connected: false,
        }
    }

    /// True once a presence announcement has been accepted by the transport.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Forget the handshake so the next tick announces again.
    pub fn reset(&mut self) {
        self.connected = false;
    }

    pub fn tick(
        &mut self,
        transport: &dyn MeshTransport,
        root: NodeAddress,
        triggered: bool,
    ) -> TickReport {
        let mut next_delay = self.poll_period;

        let handshake = if self.connected {
            None
        } else {
            let result = self.announce(transport, root);
            if result.is_err() {
                next_delay = self.handshake_retry;
            }
            Some(result)
        };

        let report = triggered.then(|| self.report(transport, root));

        TickReport {
            handshake,
            report,
            next_delay,
        }
    }

    fn announce(&mut self, transport: &dyn MeshTransport, root: NodeAddress) -> Result<(), TransportError> {
        let message = Message::PresenceAnnounce {
            logical_id: self.logical_id.clone(),
            address: transport.local_address(),
        };
        match transport.send(&root, &message.encode()) {
            Ok(()) => {
                self.connected = true;
                tracing::info!(root = %root, logical_id = %self.logical_id, "presence announced");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(root = %root, error = %e, "presence announcement failed");
                Err(e)
            }
        }
    }

    fn report(&self, transport: &dyn MeshTransport, root: NodeAddress) -> Result<(), TransportError> {
        let payload = Message::DataReport {
            value: self.report_value,
        }
        .encode();
        match transport.send(&root, &payload) {
            Ok(()) => {
                tracing::debug!(root = %root, value = self.report_value, "data report sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(root = %root, error = %e, "data report dropped");
                Err(e)
            }
        }
    }
}
