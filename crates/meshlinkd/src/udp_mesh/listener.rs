//! Frame listener and peer expiry.
//!
//! The listener turns every datagram into mesh events: the first frame from
//! a peer raises a join event, data frames raise `Message`. The expiry task
//! raises a leave event for peers that have gone quiet.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use meshlink_services::{EventSender, MeshEvent};

use super::frame::{Frame, FrameKind, MAX_FRAME};
use super::UdpMesh;

pub async fn listener_loop(
    mesh: Arc<UdpMesh>,
    socket: UdpSocket,
    events: EventSender,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut buf = vec![0u8; MAX_FRAME];

    tracing::info!(local = %mesh.local, "mesh listener starting");

    loop {
        let (len, from) = tokio::select! {
            r = socket.recv_from(&mut buf) => match r {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "recv_from failed");
                    continue;
                }
            },
            _ = shutdown.recv() => {
                tracing::info!("mesh listener shutting down");
                return Ok(());
            }
        };

        let frame = match Frame::parse(&buf[..len]) {
            Ok(f) => f,
            Err(e) => {
                tracing::trace!(from = %from, error = %e, "unparseable datagram");
                continue;
            }
        };

        if frame.source == mesh.local {
            tracing::trace!("ignoring own frame");
            continue;
        }

        if mesh.touch(frame.source, from) {
            tracing::info!(peer = %frame.source, socket = %from, "peer joined");
            if events.send(mesh.join_event(frame.source)).await.is_err() {
                return Ok(());
            }
        }

        if frame.kind == FrameKind::Data {
            let event = MeshEvent::Message {
                from: frame.source,
                payload: frame.payload.to_vec(),
            };
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Report peers that have not been heard from within `ttl`.
pub async fn expiry_loop(
    mesh: Arc<UdpMesh>,
    ttl: Duration,
    events: EventSender,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(1).min(ttl));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.recv() => return Ok(()),
        }

        for peer in mesh.expire(ttl) {
            tracing::info!(peer = %peer, "peer expired");
            if events.send(mesh.leave_event(peer)).await.is_err() {
                return Ok(());
            }
        }
    }
}
