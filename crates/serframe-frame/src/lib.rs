//! Sync-marker message framing for host/device serial links.
//!
//! Every message is framed with:
//! - A 3-byte sync marker `"|||"` so a receiver can find frame starts in a raw stream
//! - A 1-byte iuid correlating requests and responses
//! - A 1-byte packet type tag
//! - For DATA only: a 2-byte little-endian length, the payload, and a 2-byte
//!   little-endian CRC-16/ARC over the payload
//!
//! [`FrameEncoder`] writes frames to any `Write` sink. [`FrameReceiver`] pumps
//! bytes from any `Read` source into a [`FrameParser`], which reassembles
//! frames one byte at a time and resynchronizes after corruption.

pub mod checksum;
pub mod codec;
pub mod encoder;
pub mod error;
pub mod packet;
pub mod parser;
pub mod receiver;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use checksum::checksum;
pub use codec::{
    decode_frame, encode_frame, FrameConfig, CONTROL_FRAME_SIZE, DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD,
    SYNC_MARKER,
};
pub use encoder::FrameEncoder;
pub use error::{FrameError, FrameField, Result};
pub use packet::{Frame, Packet, PacketType};
pub use parser::{ByteParser, FrameParser, ParserState, ParserStats};
pub use receiver::FrameReceiver;

#[cfg(feature = "async")]
pub use tokio_codec::SerialCodec;
