//! Presence beacons.
//!
//! Periodically sends an empty beacon frame to every configured and live
//! peer so they keep this node in their routing tables.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::time;

use super::frame::FrameKind;
use super::UdpMesh;

pub async fn beacon_loop(
    mesh: Arc<UdpMesh>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut interval = time::interval(period);

    tracing::info!(
        local = %mesh.local,
        interval_ms = period.as_millis() as u64,
        "beacon loop starting"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.recv() => {
                tracing::info!("beacon loop shutting down");
                return Ok(());
            }
        }

        for target in mesh.beacon_targets() {
            match mesh.send_frame(FrameKind::Beacon, target, &[]) {
                Ok(n) => tracing::trace!(to = %target, bytes = n, "beacon sent"),
                Err(e) => tracing::warn!(to = %target, error = %e, "beacon send failed"),
            }
        }
    }
}
