use std::io::{ErrorKind, Read};

use serframe_transport::ByteSource;

use crate::error::{FrameError, Result};
use crate::packet::Frame;
use crate::parser::ByteParser;

/// Forwards bytes from any `Read` source into an incremental parser.
///
/// The receiver keeps no frame state of its own; everything about
/// reassembly lives in the parser. Both the source and the parser may be
/// owned or `&mut` borrows.
pub struct FrameReceiver<T, P> {
    inner: T,
    parser: P,
}

impl<T: Read, P: ByteParser> FrameReceiver<T, P> {
    /// Bind a source to a parser.
    pub fn new(inner: T, parser: P) -> Self {
        Self { inner, parser }
    }

    /// Read exactly `byte_count` bytes, one at a time, feeding each to the
    /// parser. Parser events are handed to `on_event` as they happen.
    ///
    /// Blocks until every byte has been read. Returns
    /// `FrameError::ShortRead` if the source hits EOF first; bytes read up to
    /// that point have already been forwarded.
    pub fn pump<F>(&mut self, byte_count: usize, mut on_event: F) -> Result<usize>
    where
        F: FnMut(P::Event),
    {
        for received in 0..byte_count {
            let Some(byte) = self.read_byte()? else {
                return Err(FrameError::ShortRead {
                    requested: byte_count,
                    received,
                });
            };
            if let Some(event) = self.parser.parse_byte(byte) {
                on_event(event);
            }
        }
        tracing::trace!(bytes = byte_count, "pumped bytes into parser");
        Ok(byte_count)
    }

    /// Read the next complete frame (blocking).
    ///
    /// Framing errors are returned as they are detected; the parser has
    /// already resynchronized, so the next call picks up with the following
    /// frame. Returns `Err(FrameError::ConnectionClosed)` at EOF.
    pub fn recv_frame(&mut self) -> Result<Frame>
    where
        P: ByteParser<Event = Result<Frame>>,
    {
        loop {
            let Some(byte) = self.read_byte()? else {
                return Err(FrameError::ConnectionClosed);
            };
            if let Some(event) = self.parser.parse_byte(byte) {
                return event;
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Borrow the parser.
    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Mutably borrow the parser.
    pub fn parser_mut(&mut self) -> &mut P {
        &mut self.parser
    }

    /// Consume the receiver and return the source and the parser.
    pub fn into_inner(self) -> (T, P) {
        (self.inner, self.parser)
    }
}

impl<T: ByteSource, P: ByteParser> FrameReceiver<T, P> {
    /// Pump exactly as many bytes as the source reports available.
    pub fn pump_available<F>(&mut self, on_event: F) -> Result<usize>
    where
        F: FnMut(P::Event),
    {
        let available = self.inner.bytes_available()?;
        self.pump(available, on_event)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use bytes::{Bytes, BytesMut};
    use serframe_transport::LoopbackPort;

    use super::*;
    use crate::codec::encode_frame;
    use crate::encoder::FrameEncoder;
    use crate::packet::PacketType;
    use crate::parser::{FrameParser, ParserState};

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn pump_forwards_exact_count() {
        let bytes = wire(&[Frame::data(5, vec![1u8, 2, 3])]);
        let mut receiver = FrameReceiver::new(Cursor::new(bytes.clone()), FrameParser::new());

        let mut events = Vec::new();
        let n = receiver.pump(bytes.len(), |e| events.push(e)).unwrap();

        assert_eq!(n, bytes.len());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events.pop().unwrap().unwrap(),
            Frame::data(5, vec![1u8, 2, 3])
        );
        assert_eq!(receiver.get_ref().position() as usize, bytes.len());
    }

    #[test]
    fn pump_zero_reads_nothing() {
        let mut receiver = FrameReceiver::new(Cursor::new(vec![1u8]), FrameParser::new());
        assert_eq!(receiver.pump(0, |_| {}).unwrap(), 0);
        assert_eq!(receiver.get_ref().position(), 0);
    }

    #[test]
    fn parser_state_spans_pump_calls() {
        let bytes = wire(&[Frame::data(1, Bytes::from_static(b"split"))]);
        let mut receiver = FrameReceiver::new(Cursor::new(bytes.clone()), FrameParser::new());

        let mut events = Vec::new();
        receiver.pump(6, |e| events.push(e)).unwrap();
        assert!(events.is_empty());
        assert_eq!(receiver.parser().state(), ParserState::Length);

        receiver.pump(bytes.len() - 6, |e| events.push(e)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[test]
    fn short_read_reports_progress_and_keeps_events() {
        let mut bytes = wire(&[Frame::control(1, PacketType::Ack)]);
        bytes.extend_from_slice(b"|||");
        let mut receiver = FrameReceiver::new(Cursor::new(bytes), FrameParser::new());

        let mut events = Vec::new();
        let err = receiver.pump(20, |e| events.push(e)).unwrap_err();

        assert!(matches!(
            err,
            FrameError::ShortRead {
                requested: 20,
                received: 8
            }
        ));
        assert_eq!(events.len(), 1);
        assert_eq!(receiver.parser().state(), ParserState::Iuid);
    }

    #[test]
    fn pump_available_drains_cursor() {
        let frames = vec![
            Frame::data(1, Bytes::from_static(b"one")),
            Frame::control(2, PacketType::IdRequest),
            Frame::data(3, Bytes::from_static(b"three")),
        ];
        let mut receiver = FrameReceiver::new(Cursor::new(wire(&frames)), FrameParser::new());

        let mut decoded = Vec::new();
        receiver
            .pump_available(|e| decoded.push(e.unwrap()))
            .unwrap();

        assert_eq!(decoded, frames);
        assert_eq!(receiver.pump_available(|_| {}).unwrap(), 0);
    }

    #[test]
    fn borrowed_parser_keeps_stats() {
        let bytes = wire(&[
            Frame::control(1, PacketType::Ack),
            Frame::control(2, PacketType::Nack),
        ]);
        let mut parser = FrameParser::new();
        {
            let mut receiver = FrameReceiver::new(bytes.as_slice(), &mut parser);
            receiver.pump_available(|_| {}).unwrap();
        }
        assert_eq!(parser.stats().frames, 2);
    }

    #[test]
    fn recv_frame_reads_one_at_a_time() {
        let frames = vec![
            Frame::data(7, Bytes::from_static(b"a|||b")),
            Frame::control(8, PacketType::IdResponse),
        ];
        let mut receiver = FrameReceiver::new(Cursor::new(wire(&frames)), FrameParser::new());

        assert_eq!(receiver.recv_frame().unwrap(), frames[0]);
        assert_eq!(receiver.recv_frame().unwrap(), frames[1]);
        assert!(matches!(
            receiver.recv_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn recv_frame_surfaces_checksum_error_then_recovers() {
        let mut bytes = wire(&[Frame::data(1, Bytes::from_static(b"bad"))]);
        let crc_at = bytes.len() - 2;
        bytes[crc_at] ^= 0x01;
        bytes.extend(wire(&[Frame::data(2, Bytes::from_static(b"good"))]));

        let mut receiver = FrameReceiver::new(Cursor::new(bytes), FrameParser::new());

        let err = receiver.recv_frame().unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
        assert!(err.is_recoverable());

        let frame = receiver.recv_frame().unwrap();
        assert_eq!(frame, Frame::data(2, Bytes::from_static(b"good")));
    }

    #[test]
    fn recv_frame_eof_mid_frame() {
        let bytes = wire(&[Frame::data(1, Bytes::from_static(b"truncated"))]);
        let mut receiver =
            FrameReceiver::new(Cursor::new(bytes[..bytes.len() - 4].to_vec()), FrameParser::new());

        let err = receiver.recv_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[Frame::control(4, PacketType::Ack)]);
        let mut receiver = FrameReceiver::new(
            InterruptedThenData {
                interrupted: false,
                bytes,
                pos: 0,
            },
            FrameParser::new(),
        );

        let frame = receiver.recv_frame().unwrap();
        assert_eq!(frame, Frame::control(4, PacketType::Ack));
    }

    #[test]
    fn would_block_propagates_io_error() {
        let (_host, mut device) = LoopbackPort::pair();
        device.set_nonblocking(true);
        let mut receiver = FrameReceiver::new(device, FrameParser::new());

        let err = receiver.pump(1, |_| {}).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn host_and_device_over_loopback_thread() {
        let (host, device) = LoopbackPort::pair();

        let device_thread = std::thread::spawn(move || {
            let mut receiver = FrameReceiver::new(device, FrameParser::new());
            let mut received = Vec::new();
            loop {
                match receiver.recv_frame() {
                    Ok(frame) => received.push(frame),
                    Err(FrameError::ConnectionClosed) => break,
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            received
        });

        let mut encoder = FrameEncoder::new(host);
        let mut sent = Vec::new();
        for i in 0..64u8 {
            let frame = if i % 8 == 0 {
                Frame::control(i, PacketType::Ack)
            } else {
                Frame::data(i, format!("msg-{i}|||").into_bytes())
            };
            encoder.send(&frame).unwrap();
            sent.push(frame);
        }
        drop(encoder);

        let received = device_thread.join().unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn pump_available_over_loopback() {
        let (mut host, device) = LoopbackPort::pair();
        host.write_all(&wire(&[Frame::data(9, Bytes::from_static(b"ready"))]))
            .unwrap();

        let mut receiver = FrameReceiver::new(device, FrameParser::new());
        let mut frames = Vec::new();
        let n = receiver.pump_available(|e| frames.push(e)).unwrap();

        assert_eq!(n, 14);
        assert_eq!(frames.len(), 1);
        assert_eq!(receiver.get_ref().pending().unwrap(), 0);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut receiver = FrameReceiver::new(Cursor::new(Vec::<u8>::new()), FrameParser::new());

        let _ = receiver.get_ref();
        let _ = receiver.get_mut();
        receiver.parser_mut().reset();
        let (_source, parser) = receiver.into_inner();
        assert!(parser.is_idle());
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
