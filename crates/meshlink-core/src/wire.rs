//! meshlink wire format — the payloads carried over the mesh transport.
//!
//! Every payload is a flat JSON object whose `Topic` field selects the
//! message kind. Field names are part of the protocol and are shared with
//! deployed firmware; do not rename them.
//!
//! | Topic             | Fields                       | Direction        |
//! |-------------------|------------------------------|------------------|
//! | `Connect-Mesh`    | `ID` string, `SSID` address  | non-root → root  |
//! | `Send-Data`       | `Data` integer               | non-root → root  |
//! | `Mesh-Broadcast`  | `Counter` integer            | root → non-root  |
//! | `Disconnect-Mesh` | `ID` string                  | root-local only  |
//!
//! Older roots send the broadcast counter as a bare decimal string with no
//! envelope. The decoder accepts that form as well.

use serde_json::{json, Map, Value};

use crate::address::NodeAddress;

// ── Field and topic names ─────────────────────────────────────────────────────

pub const FIELD_TOPIC: &str = "Topic";
pub const FIELD_ID: &str = "ID";
pub const FIELD_SSID: &str = "SSID";
pub const FIELD_DATA: &str = "Data";
pub const FIELD_COUNTER: &str = "Counter";

pub const TOPIC_CONNECT: &str = "Connect-Mesh";
pub const TOPIC_DATA: &str = "Send-Data";
pub const TOPIC_BROADCAST: &str = "Mesh-Broadcast";
pub const TOPIC_DISCONNECT: &str = "Disconnect-Mesh";

/// Largest payload the mesh transport carries in one packet.
pub const MAX_PAYLOAD: usize = 1456;

// ── Messages ──────────────────────────────────────────────────────────────────

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A non-root node announcing itself to the root.
    PresenceAnnounce {
        logical_id: String,
        address: NodeAddress,
    },

    /// Synthesized on the root when the transport reports a peer left.
    /// Forwarded to the bridge, never sent over the mesh.
    DisconnectNotice { logical_id: String },

    /// A sensor reading from a non-root node.
    DataReport { value: i64 },

    /// A trigger fanned out by the root to every peer.
    Broadcast { sequence: u32 },
}

impl Message {
    /// The `Topic` tag for this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PresenceAnnounce { .. } => TOPIC_CONNECT,
            Message::DisconnectNotice { .. } => TOPIC_DISCONNECT,
            Message::DataReport { .. } => TOPIC_DATA,
            Message::Broadcast { .. } => TOPIC_BROADCAST,
        }
    }

    /// Serialize to bytes for transmission.
    pub fn encode(&self) -> Vec<u8> {
        let value = match self {
            Message::PresenceAnnounce {
                logical_id,
                address,
            } => json!({
                FIELD_TOPIC: TOPIC_CONNECT,
                FIELD_ID: logical_id,
                FIELD_SSID: address.canonical(),
            }),
            Message::DisconnectNotice { logical_id } => json!({
                FIELD_TOPIC: TOPIC_DISCONNECT,
                FIELD_ID: logical_id,
            }),
            Message::DataReport { value } => json!({
                FIELD_TOPIC: TOPIC_DATA,
                FIELD_DATA: value,
            }),
            Message::Broadcast { sequence } => json!({
                FIELD_TOPIC: TOPIC_BROADCAST,
                FIELD_COUNTER: sequence,
            }),
        };
        value.to_string().into_bytes()
    }

    /// Deserialize from bytes. Never panics, whatever the input.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let data = strip_trailing_nul(data);
        if data.len() > MAX_PAYLOAD {
            return Err(DecodeError::TooLarge(data.len()));
        }
        let text = std::str::from_utf8(data)
            .map_err(|_| DecodeError::Malformed("payload is not valid UTF-8".into()))?;

        if let Some(sequence) = bare_counter(text) {
            return Ok(Message::Broadcast { sequence });
        }

        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let fields = value
            .as_object()
            .ok_or_else(|| DecodeError::Malformed("payload is not a JSON object".into()))?;

        let topic = string_field(fields, FIELD_TOPIC)?;
        match topic {
            TOPIC_CONNECT => {
                let logical_id = string_field(fields, FIELD_ID)?.to_string();
                let address = string_field(fields, FIELD_SSID)?
                    .parse()
                    .map_err(|_| DecodeError::InvalidField(FIELD_SSID))?;
                Ok(Message::PresenceAnnounce {
                    logical_id,
                    address,
                })
            }
            TOPIC_DATA => Ok(Message::DataReport {
                value: integer_field(fields, FIELD_DATA)?,
            }),
            TOPIC_BROADCAST => {
                let counter = integer_field(fields, FIELD_COUNTER)?;
                let sequence =
                    u32::try_from(counter).map_err(|_| DecodeError::InvalidField(FIELD_COUNTER))?;
                Ok(Message::Broadcast { sequence })
            }
            TOPIC_DISCONNECT => Ok(Message::DisconnectNotice {
                logical_id: string_field(fields, FIELD_ID)?.to_string(),
            }),
            other => Err(DecodeError::UnknownKind(other.to_string())),
        }
    }
}

// ── Field access ──────────────────────────────────────────────────────────────

fn string_field<'a>(fields: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, DecodeError> {
    fields
        .get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_str()
        .ok_or(DecodeError::InvalidField(name))
}

fn integer_field(fields: &Map<String, Value>, name: &'static str) -> Result<i64, DecodeError> {
    fields
        .get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_i64()
        .ok_or(DecodeError::InvalidField(name))
}

/// Firmware senders include the C string terminator in the payload length.
fn strip_trailing_nul(mut data: &[u8]) -> &[u8] {
    while let [rest @ .., 0] = data {
        data = rest;
    }
    data
}

/// The legacy broadcast form: nothing but ASCII digits.
fn bare_counter(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting a received payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    #[error("missing required field {0:?}")]
    MissingField(&'static str),

    #[error("field {0:?} has the wrong type or value")]
    InvalidField(&'static str),

    #[error("payload length {0} exceeds maximum {}", MAX_PAYLOAD)]
    TooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
