//! Incremental, byte-at-a-time frame reassembly.
//!
//! ```text
//! SeekSync ─"|||"─▶ Iuid ─▶ Type ─┬─ control ──────────────────────────▶ complete
//!                                 └─ DATA ─▶ Length ─▶ Payload ─▶ Checksum ─▶ complete
//! ```
//!
//! Every completion or error returns the parser to `SeekSync`. Payload bytes
//! are counted, never scanned, so a `"|||"` inside a payload is just data.

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::checksum::checksum;
use crate::codec::{DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD, SYNC_MARKER};
use crate::error::{FrameError, FrameField, Result};
use crate::packet::{Frame, PacketType};

/// Consumes one byte at a time and occasionally emits an event.
pub trait ByteParser {
    /// What the parser reports when a unit completes or fails.
    type Event;

    /// Advance the parser by one byte.
    fn parse_byte(&mut self, byte: u8) -> Option<Self::Event>;
}

impl<P: ByteParser + ?Sized> ByteParser for &mut P {
    type Event = P::Event;

    fn parse_byte(&mut self, byte: u8) -> Option<Self::Event> {
        (**self).parse_byte(byte)
    }
}

/// The field the parser expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    SeekSync,
    Iuid,
    Type,
    Length,
    Payload,
    Checksum,
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames completed.
    pub frames: u64,
    /// Framing errors emitted.
    pub errors: u64,
    /// Bytes skipped while hunting for a sync marker.
    pub discarded: u64,
}

#[derive(Debug, Clone, Copy)]
enum State {
    SeekSync { matched: usize },
    Iuid,
    Type { iuid: u8 },
    Length { iuid: u8, low: Option<u8> },
    Payload { iuid: u8, remaining: usize },
    Checksum { iuid: u8, low: Option<u8> },
}

/// Reassembles frames from a byte stream.
#[derive(Debug)]
pub struct FrameParser {
    state: State,
    payload: BytesMut,
    max_payload: usize,
    stats: ParserStats,
}

impl FrameParser {
    /// Create a parser accepting payloads up to 65535 bytes.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a parser with a tighter payload limit (clamped to 65535).
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            state: State::SeekSync { matched: 0 },
            payload: BytesMut::new(),
            max_payload: max_payload.min(MAX_PAYLOAD),
            stats: ParserStats::default(),
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn state(&self) -> ParserState {
        match self.state {
            State::SeekSync { .. } => ParserState::SeekSync,
            State::Iuid => ParserState::Iuid,
            State::Type { .. } => ParserState::Type,
            State::Length { .. } => ParserState::Length,
            State::Payload { .. } => ParserState::Payload,
            State::Checksum { .. } => ParserState::Checksum,
        }
    }

    /// True when no frame is in progress, not even a partial sync marker.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::SeekSync { matched: 0 })
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Drop any partial frame and hunt for the next sync marker.
    pub fn reset(&mut self) {
        self.state = State::SeekSync { matched: 0 };
        self.payload.clear();
    }

    fn fail(&mut self, err: FrameError) -> Option<Result<Frame>> {
        self.reset();
        self.stats.errors += 1;
        Some(Err(err))
    }

    fn complete(&mut self, frame: Frame) -> Option<Result<Frame>> {
        self.reset();
        self.stats.frames += 1;
        debug!(
            iuid = frame.iuid,
            packet_type = %frame.packet_type(),
            payload_size = frame.payload().map_or(0, |p| p.len()),
            "frame complete"
        );
        Some(Ok(frame))
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteParser for FrameParser {
    type Event = Result<Frame>;

    fn parse_byte(&mut self, byte: u8) -> Option<Result<Frame>> {
        match self.state {
            State::SeekSync { matched } => {
                if byte == SYNC_MARKER[matched] {
                    let matched = matched + 1;
                    self.state = if matched == SYNC_MARKER.len() {
                        State::Iuid
                    } else {
                        State::SeekSync { matched }
                    };
                    None
                } else if matched > 0 {
                    debug!(byte, matched, "sync marker broken");
                    self.fail(FrameError::SyncLost {
                        field: FrameField::Sync,
                        byte,
                    })
                } else {
                    self.stats.discarded += 1;
                    trace!(byte, "discarding byte outside frame");
                    None
                }
            }
            State::Iuid => {
                self.state = State::Type { iuid: byte };
                None
            }
            State::Type { iuid } => match PacketType::from_tag(byte) {
                Some(PacketType::Data) => {
                    self.state = State::Length { iuid, low: None };
                    None
                }
                Some(kind) => self.complete(Frame::control(iuid, kind)),
                None => {
                    debug!(byte, iuid, "unknown packet type tag");
                    self.fail(FrameError::SyncLost {
                        field: FrameField::Type,
                        byte,
                    })
                }
            },
            State::Length { iuid, low: None } => {
                self.state = State::Length {
                    iuid,
                    low: Some(byte),
                };
                None
            }
            State::Length {
                iuid,
                low: Some(low),
            } => {
                let size = u16::from_le_bytes([low, byte]) as usize;
                if size > self.max_payload {
                    warn!(size, max = self.max_payload, "payload length overflow");
                    return self.fail(FrameError::LengthOverflow {
                        size,
                        max: self.max_payload,
                    });
                }
                self.payload.clear();
                self.payload.reserve(size);
                self.state = if size == 0 {
                    State::Checksum { iuid, low: None }
                } else {
                    State::Payload {
                        iuid,
                        remaining: size,
                    }
                };
                None
            }
            State::Payload { iuid, remaining } => {
                self.payload.extend_from_slice(&[byte]);
                self.state = if remaining == 1 {
                    State::Checksum { iuid, low: None }
                } else {
                    State::Payload {
                        iuid,
                        remaining: remaining - 1,
                    }
                };
                None
            }
            State::Checksum { iuid, low: None } => {
                self.state = State::Checksum {
                    iuid,
                    low: Some(byte),
                };
                None
            }
            State::Checksum {
                iuid,
                low: Some(low),
            } => {
                let received = u16::from_le_bytes([low, byte]);
                let payload = self.payload.split().freeze();
                let computed = checksum(&payload);
                if received != computed {
                    warn!(iuid, received, computed, "checksum mismatch");
                    return self.fail(FrameError::ChecksumMismatch { received, computed });
                }
                self.complete(Frame::data(iuid, payload))
            }
        }
    }
}
