//! Packet kinds and the frame model.
//!
//! Only [`PacketType::Data`] carries a payload. Every other kind is a control
//! frame made of the sync marker, the iuid and the type tag alone.

use std::fmt;

use bytes::Bytes;

use crate::checksum::{checksum, CHECKSUM_SIZE};
use crate::codec::{CONTROL_FRAME_SIZE, LENGTH_SIZE};

/// Closed set of packet kinds, coded on the wire as one ASCII byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Positive acknowledgement.
    Ack,
    /// Negative acknowledgement.
    Nack,
    /// Application data with length, payload and checksum.
    Data,
    /// Ask the device to identify itself.
    IdRequest,
    /// Identification reply.
    IdResponse,
}

impl PacketType {
    /// All packet kinds, in tag order.
    pub const ALL: [PacketType; 5] = [
        PacketType::Ack,
        PacketType::Nack,
        PacketType::Data,
        PacketType::IdRequest,
        PacketType::IdResponse,
    ];

    /// Wire tag for this kind.
    pub const fn tag(self) -> u8 {
        match self {
            PacketType::Ack => b'a',
            PacketType::Nack => b'n',
            PacketType::Data => b'd',
            PacketType::IdRequest => b'i',
            PacketType::IdResponse => b'I',
        }
    }

    /// Look up a kind by its wire tag.
    pub const fn from_tag(tag: u8) -> Option<PacketType> {
        match tag {
            b'a' => Some(PacketType::Ack),
            b'n' => Some(PacketType::Nack),
            b'd' => Some(PacketType::Data),
            b'i' => Some(PacketType::IdRequest),
            b'I' => Some(PacketType::IdResponse),
            _ => None,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            PacketType::Ack => "ACK",
            PacketType::Nack => "NACK",
            PacketType::Data => "DATA",
            PacketType::IdRequest => "ID_REQUEST",
            PacketType::IdResponse => "ID_RESPONSE",
        }
    }

    /// True if frames of this kind carry length, payload and checksum fields.
    pub const fn carries_payload(self) -> bool {
        matches!(self, PacketType::Data)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packet body, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Ack,
    Nack,
    Data(Bytes),
    IdRequest,
    IdResponse,
}

impl Packet {
    /// Build a packet of the given kind. `payload` is only kept for DATA.
    pub fn new(packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        match packet_type {
            PacketType::Ack => Packet::Ack,
            PacketType::Nack => Packet::Nack,
            PacketType::Data => Packet::Data(payload.into()),
            PacketType::IdRequest => Packet::IdRequest,
            PacketType::IdResponse => Packet::IdResponse,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Ack => PacketType::Ack,
            Packet::Nack => PacketType::Nack,
            Packet::Data(_) => PacketType::Data,
            Packet::IdRequest => PacketType::IdRequest,
            Packet::IdResponse => PacketType::IdResponse,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Packet::Data(payload) => Some(payload),
            Packet::Ack | Packet::Nack | Packet::IdRequest | Packet::IdResponse => None,
        }
    }
}

/// A framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identifier correlating requests and responses.
    pub iuid: u8,
    /// The packet body.
    pub packet: Packet,
}

impl Frame {
    /// Create a frame of any kind. `payload` is ignored for control kinds.
    pub fn new(iuid: u8, packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        Self {
            iuid,
            packet: Packet::new(packet_type, payload),
        }
    }

    /// Create a DATA frame.
    pub fn data(iuid: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            iuid,
            packet: Packet::Data(payload.into()),
        }
    }

    /// Create a payload-less control frame. A `Data` kind yields an empty
    /// DATA frame.
    pub fn control(iuid: u8, packet_type: PacketType) -> Self {
        Self::new(iuid, packet_type, Bytes::new())
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet.packet_type()
    }

    /// The payload, for DATA frames.
    pub fn payload(&self) -> Option<&Bytes> {
        self.packet.payload()
    }

    /// The checksum that goes on the wire, for DATA frames.
    pub fn checksum(&self) -> Option<u16> {
        self.payload().map(|payload| checksum(payload))
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        match &self.packet {
            Packet::Data(payload) => {
                CONTROL_FRAME_SIZE + LENGTH_SIZE + payload.len() + CHECKSUM_SIZE
            }
            Packet::Ack | Packet::Nack | Packet::IdRequest | Packet::IdResponse => {
                CONTROL_FRAME_SIZE
            }
        }
    }
}
