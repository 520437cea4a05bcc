//! meshlink-services — the routing and presence protocol.
//!
//! Collaborators (mesh transport, bridge, indicator, trigger) are reached
//! through the traits defined here; the daemon supplies real ones and tests
//! supply the recording fakes in [`fakes`].

pub mod actuator;
pub mod bridge;
pub mod dispatch;
pub mod identity;
pub mod registry;
pub mod routing;
pub mod transport;

#[cfg(any(test, feature = "testkit"))]
pub mod fakes;

pub use actuator::{Indicator, Level, Trigger};
pub use bridge::{Bridge, BridgeError, Channels};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use identity::{state_channel, Identity, IdentityError, MeshState, StateReceiver, StateSender};
pub use registry::{NodeRegistry, PeerEntry, UpsertResult};
pub use routing::{FanOutReport, NodeRouter, RootRouter, TickReport};
pub use transport::{event_channel, EventReceiver, EventSender, MeshEvent, MeshTransport, TransportError};
