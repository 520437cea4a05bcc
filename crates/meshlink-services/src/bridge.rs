//! Publish/subscribe bridge seam, used by the root only.

use meshlink_core::config::BridgeConfig;

/// Egress to the external broker.
pub trait Bridge: Send + Sync {
    fn publish(&self, channel: &str, payload: &str) -> Result<(), BridgeError>;
}

/// The three logical channels the root publishes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels {
    pub connect: String,
    pub disconnect: String,
    pub data: String,
}

impl Default for Channels {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for Channels {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            connect: config.connect_channel.clone(),
            disconnect: config.disconnect_channel.clone(),
            data: config.data_channel.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge is not connected")]
    NotConnected,

    #[error("publish to {channel} failed: {reason}")]
    PublishFailed { channel: String, reason: String },
}
