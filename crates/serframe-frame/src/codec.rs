use bytes::{Buf, BufMut, BytesMut};

use crate::checksum::checksum;
use crate::error::{FrameError, Result};
use crate::packet::{Frame, Packet};
use crate::parser::{ByteParser, FrameParser};

/// Sync marker that opens every frame: "|||" (0x7C 0x7C 0x7C).
pub const SYNC_MARKER: [u8; 3] = *b"|||";

/// Width of the iuid field.
pub const IUID_SIZE: usize = 1;

/// Width of the packet type field.
pub const TYPE_SIZE: usize = 1;

/// Width of the little-endian payload length field (DATA only).
pub const LENGTH_SIZE: usize = 2;

/// Sync marker (3) + iuid (1) + type (1) = 5 bytes. Control frames are exactly this long.
pub const CONTROL_FRAME_SIZE: usize = SYNC_MARKER.len() + IUID_SIZE + TYPE_SIZE;

/// Largest payload the 2-byte length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Default maximum payload size: the full range of the length field.
pub const DEFAULT_MAX_PAYLOAD: usize = MAX_PAYLOAD;

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬──────┬──────────┬─────────────┬──────────┐
/// │ Sync (3B) │ iuid │ type │ Length   │ Payload     │ Checksum │
/// │ "|||"     │ (1B) │ (1B) │ (2B LE)  │ (Length B)  │ (2B LE)  │
/// └───────────┴──────┴──────┴──────────┴─────────────┴──────────┘
///                            └──────── DATA frames only ────────┘
/// ```
///
/// The checksum is CRC-16/ARC over the payload bytes.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if let Packet::Data(payload) = &frame.packet {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::LengthOverflow {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
    }

    dst.reserve(frame.wire_size());
    dst.put_slice(&SYNC_MARKER);
    dst.put_u8(frame.iuid);
    dst.put_u8(frame.packet_type().tag());
    match &frame.packet {
        Packet::Data(payload) => {
            dst.put_u16_le(payload.len() as u16);
            dst.put_slice(payload);
            dst.put_u16_le(checksum(payload));
        }
        Packet::Ack | Packet::Nack | Packet::IdRequest | Packet::IdResponse => {}
    }
    Ok(())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet; in
/// that case nothing is consumed unless the whole buffer was line noise.
/// On success or on a framing error, consumes the bytes up to and including
/// the one that completed (or broke) the frame.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let mut parser = FrameParser::with_max_payload(max_payload);
    let mut event = None;
    let consumed = src.iter().position(|&byte| {
        event = parser.parse_byte(byte);
        event.is_some()
    });

    match (consumed, event) {
        (Some(index), Some(event)) => {
            src.advance(index + 1);
            event.map(Some)
        }
        _ => {
            if parser.is_idle() {
                tracing::trace!(discarded = src.len(), "dropping bytes outside any frame");
                src.clear();
            }
            Ok(None)
        }
    }
}

/// Frame encoder configuration.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// iuid stamped on frames sent through `FrameEncoder::encode`. Default: 0.
    pub iuid: u8,
    /// Maximum payload size in bytes. Default and ceiling: 65535.
    pub max_payload_size: usize,
}

impl FrameConfig {
    /// The payload limit actually enforced; never above the length field's range.
    pub fn effective_max_payload(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            iuid: 0,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
