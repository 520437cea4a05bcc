//! Transmit loop.
//!
//! Polls the trigger on a fixed cadence once the node has joined the mesh.
//! As root it lights the indicator and fans triggers out to the routing
//! table; otherwise it keeps the presence handshake with the root alive and
//! forwards triggers as data reports. A node that loses its parent holds
//! off until it rejoins, then announces itself again.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;

use meshlink_core::config::MeshlinkConfig;
use meshlink_core::{NodeAddress, Role};
use meshlink_services::{
    Identity, IdentityError, Indicator, Level, MeshTransport, NodeRouter, RootRouter, Trigger,
};

pub struct TransmitLoop {
    identity: Identity,
    transport: Arc<dyn MeshTransport>,
    trigger: Arc<dyn Trigger>,
    indicator: Arc<dyn Indicator>,
    root_router: RootRouter,
    node_router: NodeRouter,
    route_table_size: usize,
    poll_period: Duration,
    /// Root address the handshake was last made against.
    last_root: Option<NodeAddress>,
    parent_lost: bool,
    shutdown: broadcast::Receiver<()>,
}

impl TransmitLoop {
    pub fn new(
        config: &MeshlinkConfig,
        identity: Identity,
        transport: Arc<dyn MeshTransport>,
        trigger: Arc<dyn Trigger>,
        indicator: Arc<dyn Indicator>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            identity,
            transport,
            trigger,
            indicator,
            root_router: RootRouter::new(),
            node_router: NodeRouter::new(
                config.node.logical_id.clone(),
                config.routing.report_value,
                config.routing.poll_period(),
                config.routing.handshake_retry(),
            ),
            route_table_size: config.mesh.route_table_size,
            poll_period: config.routing.poll_period(),
            last_root: None,
            parent_lost: false,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        tokio::select! {
            connected = self.identity.wait_connected() => {
                if !connected {
                    tracing::warn!("mesh state publisher gone before connecting");
                    return Ok(());
                }
            }
            _ = self.shutdown.recv() => return Ok(()),
        }
        tracing::info!(role = %self.identity.role(), "transmit loop starting");

        loop {
            let delay = self.tick();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.recv() => {
                    tracing::info!("transmit loop shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Run one tick. Returns how long to wait before the next.
    pub fn tick(&mut self) -> Duration {
        match self.identity.role() {
            Role::Root => self.root_tick(),
            Role::NonRoot => self.node_tick(),
        }
    }

    fn root_tick(&mut self) -> Duration {
        self.indicator.set_indicator(Level::High);
        if self.trigger.read_trigger() {
            let report = self
                .root_router
                .fan_out(self.transport.as_ref(), self.route_table_size);
            tracing::info!(
                sequence = report.sequence,
                sent = report.sent.len(),
                failed = report.failed.len(),
                "broadcast fanned out"
            );
        }
        self.poll_period
    }

    fn node_tick(&mut self) -> Duration {
        if !self.identity.is_connected() {
            if !self.parent_lost {
                tracing::warn!("parent link lost, holding transmit");
                self.parent_lost = true;
            }
            return self.poll_period;
        }
        if self.parent_lost {
            tracing::info!("parent link restored, restarting handshake");
            self.parent_lost = false;
            self.node_router.reset();
        }

        let root = match self.identity.root_address() {
            Ok(root) => root,
            Err(IdentityError::NotReady) => {
                tracing::trace!("root address not known yet");
                return self.poll_period;
            }
        };
        if self.last_root != Some(root) {
            if self.last_root.is_some() {
                tracing::info!(root = %root, "root changed, restarting handshake");
                self.node_router.reset();
            }
            self.last_root = Some(root);
        }

        let triggered = self.trigger.read_trigger();
        self.node_router
            .tick(self.transport.as_ref(), root, triggered)
            .next_delay
    }
}
