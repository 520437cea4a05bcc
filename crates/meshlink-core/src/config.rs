//! Configuration system for meshlink.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MESHLINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/meshlink/config.toml
//!   3. ~/.config/meshlink/config.toml

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::address::{NodeAddress, Role};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshlinkConfig {
    pub node: NodeConfig,
    pub mesh: MeshConfig,
    pub routing: RoutingConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier announced to the root and published on the bridge.
    pub logical_id: String,
    /// This device's hardware address.
    pub address: NodeAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Role this node takes when the mesh starts.
    pub role: Role,
    /// Address of the root node. On the root, its own address.
    pub root_address: NodeAddress,
    /// UDP socket the host transport binds to.
    pub bind: SocketAddr,
    /// Interval between transport liveness beacons.
    pub beacon_interval_ms: u64,
    /// Peers not heard from within this window are reported disconnected.
    pub peer_ttl_ms: u64,
    /// Maximum number of addresses in one routing-table snapshot.
    pub route_table_size: usize,
    /// Directly reachable neighbours.
    pub peers: Vec<PeerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub address: NodeAddress,
    pub socket: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Transmit loop period.
    pub poll_period_ms: u64,
    /// Delay before retrying a failed presence announcement.
    pub handshake_retry_ms: u64,
    /// Value carried by a data report when the trigger fires.
    pub report_value: i64,
    /// Maximum number of peers the root tracks.
    pub registry_capacity: usize,
    /// Publish connect notifications for peers the registry had no room for.
    pub forward_rejected_peers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub connect_channel: String,
    pub disconnect_channel: String,
    pub data_channel: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            logical_id: "node-1".to_string(),
            address: NodeAddress::new([0; 6]),
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            role: Role::NonRoot,
            root_address: NodeAddress::new([0; 6]),
            bind: SocketAddr::from(([0, 0, 0, 0], 7700)),
            beacon_interval_ms: 1000,
            peer_ttl_ms: 5000,
            route_table_size: 50,
            peers: Vec::new(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: 300,
            handshake_retry_ms: 500,
            report_value: 156,
            registry_capacity: 30,
            forward_rejected_peers: true,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connect_channel: "ESP-connect".to_string(),
            disconnect_channel: "ESP-disconnect".to_string(),
            data_channel: "ESP-send".to_string(),
        }
    }
}

impl MeshConfig {
    pub fn beacon_interval(&self) -> Duration {
        Duration::from_millis(self.beacon_interval_ms)
    }

    pub fn peer_ttl(&self) -> Duration {
        Duration::from_millis(self.peer_ttl_ms)
    }
}

impl RoutingConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn handshake_retry(&self) -> Duration {
        Duration::from_millis(self.handshake_retry_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("meshlink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MeshlinkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MeshlinkConfig::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MESHLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MeshlinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.logical_id.is_empty() {
            return Err(ConfigError::Invalid("node.logical_id", "must not be empty".into()));
        }
        if self.routing.registry_capacity == 0 {
            return Err(ConfigError::Invalid(
                "routing.registry_capacity",
                "must be at least 1".into(),
            ));
        }
        if self.routing.poll_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "routing.poll_period_ms",
                "must be at least 1".into(),
            ));
        }
        if self.mesh.beacon_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "mesh.beacon_interval_ms",
                "must be at least 1".into(),
            ));
        }
        if self.mesh.peer_ttl_ms == 0 {
            return Err(ConfigError::Invalid("mesh.peer_ttl_ms", "must be at least 1".into()));
        }
        if self.mesh.role.is_root() && self.mesh.root_address != self.node.address {
            return Err(ConfigError::Invalid(
                "mesh.root_address",
                "a root node must name its own address".into(),
            ));
        }
        Ok(())
    }

    /// Apply MESHLINK_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by env var name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("MESHLINK_NODE__LOGICAL_ID") {
            self.node.logical_id = v;
        }
        if let Some(v) = lookup("MESHLINK_NODE__ADDRESS") {
            self.node.address = parse_override("MESHLINK_NODE__ADDRESS", &v)?;
        }
        if let Some(v) = lookup("MESHLINK_MESH__ROLE") {
            self.mesh.role = parse_override("MESHLINK_MESH__ROLE", &v)?;
        }
        if let Some(v) = lookup("MESHLINK_MESH__ROOT_ADDRESS") {
            self.mesh.root_address = parse_override("MESHLINK_MESH__ROOT_ADDRESS", &v)?;
        }
        if let Some(v) = lookup("MESHLINK_MESH__BIND") {
            self.mesh.bind = parse_override("MESHLINK_MESH__BIND", &v)?;
        }
        if let Some(v) = lookup("MESHLINK_ROUTING__POLL_PERIOD_MS") {
            self.routing.poll_period_ms = parse_override("MESHLINK_ROUTING__POLL_PERIOD_MS", &v)?;
        }
        Ok(())
    }
}

fn parse_override<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid(key, format!("{value:?}: {e}")))
}
