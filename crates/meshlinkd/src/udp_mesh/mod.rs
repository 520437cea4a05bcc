//! UDP mesh: a single-hop stand-in for the radio mesh stack.
//!
//! Lets several meshlinkd processes form a mesh on one host or LAN. Each
//! node binds one UDP socket; payloads travel in data frames and presence
//! is tracked from periodic beacons. Peers are learned from configuration
//! and from any frame received. A peer not heard from within the TTL is
//! reported disconnected. On a non-root node the root is the parent, so
//! losing and regaining it is reported as a parent link change.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use meshlink_core::config::MeshConfig;
use meshlink_core::wire::MAX_PAYLOAD;
use meshlink_core::{NodeAddress, Role};
use meshlink_services::{EventSender, MeshEvent, MeshTransport, TransportError};

pub mod beacon;
pub mod frame;
pub mod listener;

use frame::FrameKind;

/// Layer reported for the root; every other node sits one hop below it.
const ROOT_LAYER: u8 = 1;

#[derive(Debug, Clone, Copy)]
struct LivePeer {
    socket: SocketAddr,
    last_seen: Instant,
}

pub struct UdpMesh {
    socket: StdUdpSocket,
    role: Role,
    local: NodeAddress,
    root: NodeAddress,
    configured: HashMap<NodeAddress, SocketAddr>,
    live: DashMap<NodeAddress, LivePeer>,
    route_table_size: usize,
}

impl UdpMesh {
    /// Bind the mesh socket. Returns the transport and the async receive
    /// half for [`listener::listener_loop`].
    pub fn bind(config: &MeshConfig, local: NodeAddress) -> Result<(Arc<Self>, UdpSocket)> {
        let socket = make_socket(config.bind)
            .with_context(|| format!("failed to bind mesh socket on {}", config.bind))?;
        let recv_half = UdpSocket::from_std(
            socket.try_clone().context("failed to clone mesh socket")?,
        )
        .context("failed to convert to tokio UdpSocket")?;

        let configured = config
            .peers
            .iter()
            .filter(|p| p.address != local)
            .map(|p| (p.address, p.socket))
            .collect();

        let mesh = Arc::new(Self {
            socket,
            role: config.role,
            local,
            root: config.root_address,
            configured,
            live: DashMap::new(),
            route_table_size: config.route_table_size,
        });
        Ok((mesh, recv_half))
    }

    pub fn local_socket(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("mesh socket has no local address")
    }

    /// Events a radio stack raises once it has formed or joined a mesh.
    pub async fn announce_startup(&self, events: &EventSender) -> Result<()> {
        let (parent, layer) = match self.role {
            Role::Root => (self.local, ROOT_LAYER),
            Role::NonRoot => (self.root, ROOT_LAYER + 1),
        };
        for event in [
            MeshEvent::Started,
            MeshEvent::ParentConnected { parent, layer },
            MeshEvent::RootAddress(self.root),
        ] {
            events.send(event).await.context("event channel closed")?;
        }
        Ok(())
    }

    /// Record a frame from `address`. Returns true the first time a peer is heard.
    fn touch(&self, address: NodeAddress, socket: SocketAddr) -> bool {
        let seen = LivePeer {
            socket,
            last_seen: Instant::now(),
        };
        match self.live.entry(address) {
            Entry::Occupied(mut e) => {
                *e.get_mut() = seen;
                false
            }
            Entry::Vacant(e) => {
                e.insert(seen);
                true
            }
        }
    }

    /// Drop peers not heard from within `ttl`. Returns who was dropped.
    fn expire(&self, ttl: Duration) -> Vec<NodeAddress> {
        let mut gone = Vec::new();
        self.live.retain(|address, peer| {
            let keep = peer.last_seen.elapsed() < ttl;
            if !keep {
                gone.push(*address);
            }
            keep
        });
        gone
    }

    /// Event for the first frame heard from `peer`.
    fn join_event(&self, peer: NodeAddress) -> MeshEvent {
        if self.role == Role::NonRoot && peer == self.root {
            MeshEvent::ParentConnected {
                parent: peer,
                layer: ROOT_LAYER + 1,
            }
        } else {
            MeshEvent::ChildConnected(peer)
        }
    }

    /// Event for `peer` going quiet.
    fn leave_event(&self, peer: NodeAddress) -> MeshEvent {
        if self.role == Role::NonRoot && peer == self.root {
            MeshEvent::ParentDisconnected {
                reason: "root silent".into(),
            }
        } else {
            MeshEvent::ChildDisconnected(peer)
        }
    }

    fn resolve(&self, dest: &NodeAddress) -> Option<SocketAddr> {
        self.live
            .get(dest)
            .map(|p| p.socket)
            .or_else(|| self.configured.get(dest).copied())
    }

    /// Every socket a beacon should reach: configured peers and live ones.
    fn beacon_targets(&self) -> Vec<SocketAddr> {
        let mut targets: Vec<SocketAddr> = self.configured.values().copied().collect();
        for peer in self.live.iter() {
            if !targets.contains(&peer.socket) {
                targets.push(peer.socket);
            }
        }
        targets
    }

    fn send_frame(&self, kind: FrameKind, to: SocketAddr, payload: &[u8]) -> std::io::Result<usize> {
        self.socket
            .send_to(&frame::encode(kind, &self.local, payload), to)
    }
}

impl MeshTransport for UdpMesh {
    fn role(&self) -> Role {
        self.role
    }

    fn local_address(&self) -> NodeAddress {
        self.local
    }

    fn routing_table(&self) -> Vec<NodeAddress> {
        std::iter::once(self.local)
            .chain(self.live.iter().map(|e| *e.key()))
            .take(self.route_table_size)
            .collect()
    }

    fn send(&self, dest: &NodeAddress, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(TransportError::PayloadTooLarge(payload.len()));
        }
        let to = self.resolve(dest).ok_or(TransportError::NoRoute(*dest))?;
        let n = self.send_frame(FrameKind::Data, to, payload)?;
        tracing::trace!(dest = %dest, bytes = n, "data frame sent");
        Ok(())
    }
}

/// Create a non-blocking UDP socket bound to `addr`.
fn make_socket(addr: SocketAddr) -> Result<StdUdpSocket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;
    socket.bind(&addr.into()).context("bind()")?;

    Ok(socket.into())
}
