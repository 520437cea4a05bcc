//! Datagram framing for the UDP mesh.
//!
//! Every datagram starts with a 7-byte header naming the frame kind and the
//! sending node. Data frames carry one protocol payload after the header;
//! beacons carry nothing.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use meshlink_core::wire::MAX_PAYLOAD;
use meshlink_core::NodeAddress;

/// Wire size: 7 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct FrameHeader {
    /// FRAME_DATA or FRAME_BEACON.
    pub kind: u8,
    /// Hardware address of the sending node.
    pub source: [u8; 6],
}

assert_eq_size!(FrameHeader, [u8; 7]);

pub const FRAME_DATA: u8 = 0x01;
pub const FRAME_BEACON: u8 = 0x02;

pub const HEADER_LEN: usize = std::mem::size_of::<FrameHeader>();

/// Largest datagram the listener accepts.
pub const MAX_FRAME: usize = HEADER_LEN + MAX_PAYLOAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data,
    Beacon,
}

/// A parsed datagram borrowing its payload from the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub kind: FrameKind,
    pub source: NodeAddress,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("datagram shorter than frame header ({0} bytes)")]
    Truncated(usize),

    #[error("unknown frame kind: 0x{0:02x}")]
    UnknownKind(u8),
}

impl<'a> Frame<'a> {
    pub fn parse(datagram: &'a [u8]) -> Result<Self, FrameError> {
        let header =
            FrameHeader::read_from_prefix(datagram).ok_or(FrameError::Truncated(datagram.len()))?;
        let kind = match header.kind {
            FRAME_DATA => FrameKind::Data,
            FRAME_BEACON => FrameKind::Beacon,
            other => return Err(FrameError::UnknownKind(other)),
        };
        Ok(Self {
            kind,
            source: NodeAddress::new(header.source),
            payload: &datagram[HEADER_LEN..],
        })
    }
}

pub fn encode(kind: FrameKind, source: &NodeAddress, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        kind: match kind {
            FrameKind::Data => FRAME_DATA,
            FrameKind::Beacon => FRAME_BEACON,
        },
        source: *source.as_bytes(),
    };
    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
    datagram.extend_from_slice(header.as_bytes());
    datagram.extend_from_slice(payload);
    datagram
}
