//! meshlink-core — shared types, wire format, and configuration.
//! All other meshlink crates depend on this one.

pub mod address;
pub mod config;
pub mod wire;

pub use address::{AddressError, NodeAddress, Role, RoleError};
pub use wire::{DecodeError, Message};
