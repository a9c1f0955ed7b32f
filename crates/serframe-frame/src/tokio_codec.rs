//! `tokio_util::codec` adapter (requires the `async` feature).

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_frame, DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD};
use crate::error::{FrameError, Result};
use crate::packet::{Frame, Packet};
use crate::parser::{ByteParser, FrameParser};

/// Frame codec for `FramedRead` / `FramedWrite` over async byte streams.
///
/// Corrupt frames are logged and skipped so a framed stream survives line
/// noise; only I/O errors end the stream.
#[derive(Debug)]
pub struct SerialCodec {
    parser: FrameParser,
    max_payload: usize,
    dropped: u64,
}

impl SerialCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        let max_payload = max_payload.min(MAX_PAYLOAD);
        Self {
            parser: FrameParser::with_max_payload(max_payload),
            max_payload,
            dropped: 0,
        }
    }

    /// Number of corrupt frames skipped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }
}

impl Default for SerialCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SerialCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let mut consumed = 0usize;
        let mut decoded = None;

        for &byte in src.iter() {
            consumed += 1;
            match self.parser.parse_byte(byte) {
                Some(Ok(frame)) => {
                    decoded = Some(frame);
                    break;
                }
                Some(Err(err)) => {
                    self.dropped += 1;
                    warn!(error = %err, "dropping corrupt frame");
                }
                None => {}
            }
        }

        src.advance(consumed);
        Ok(decoded)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let frame = self.decode(src)?;
        if frame.is_none() && !self.parser.is_idle() {
            warn!(state = ?self.parser.state(), "stream ended inside a frame");
            self.parser.reset();
        }
        Ok(frame)
    }
}

impl Encoder<Frame> for SerialCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if let Packet::Data(payload) = &frame.packet {
            if payload.len() > self.max_payload {
                return Err(FrameError::LengthOverflow {
                    size: payload.len(),
                    max: self.max_payload,
                });
            }
        }
        encode_frame(&frame, dst)
    }
}
