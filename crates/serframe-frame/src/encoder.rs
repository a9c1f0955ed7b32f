use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::packet::{Frame, Packet, PacketType};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to any `Write` sink.
///
/// The sink may be owned or a `&mut` borrow of a longer-lived port. Each call
/// serializes one frame, writes all of it and flushes before returning.
pub struct FrameEncoder<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameEncoder<T> {
    /// Create a new frame encoder with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame encoder with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a message using the configured iuid.
    ///
    /// `payload` is only transmitted for [`PacketType::Data`]; control kinds
    /// go out as sync marker, iuid and type alone.
    pub fn encode(&mut self, payload: &[u8], packet_type: PacketType) -> Result<()> {
        self.encode_with_iuid(self.config.iuid, payload, packet_type)
    }

    /// Encode and send a message with an explicit iuid.
    pub fn encode_with_iuid(
        &mut self,
        iuid: u8,
        payload: &[u8],
        packet_type: PacketType,
    ) -> Result<()> {
        let frame = Frame::new(iuid, packet_type, payload.to_vec());
        self.send(&frame)
    }

    /// Write a complete frame (blocking).
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        if let Packet::Data(payload) = &frame.packet {
            let max = self.config.effective_max_payload();
            if payload.len() > max {
                return Err(FrameError::LengthOverflow {
                    size: payload.len(),
                    max,
                });
            }
        }

        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        tracing::trace!(
            iuid = frame.iuid,
            packet_type = %frame.packet_type(),
            bytes = self.buf.len(),
            "frame written"
        );
        self.flush()
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the encoder and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Change the iuid stamped by [`FrameEncoder::encode`].
    pub fn set_iuid(&mut self, iuid: u8) {
        self.config.iuid = iuid;
    }

    /// Current frame encoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::checksum::checksum;
    use crate::codec::{decode_frame, DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD};

    fn written(encoder: FrameEncoder<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(encoder.into_inner().into_inner().as_slice())
    }

    #[test]
    fn encode_concrete_scenario() {
        let mut encoder = FrameEncoder::new(Cursor::new(Vec::<u8>::new()));
        encoder
            .encode_with_iuid(5, &[0x01, 0x02, 0x03], PacketType::Data)
            .unwrap();

        let crc = checksum(&[0x01, 0x02, 0x03]).to_le_bytes();
        let mut expected = b"|||".to_vec();
        expected.extend([0x05, PacketType::Data.tag(), 0x03, 0x00, 0x01, 0x02, 0x03]);
        expected.extend(crc);

        let mut wire = written(encoder);
        assert_eq!(wire.as_ref(), expected.as_slice());

        let frame = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame, Frame::data(5, vec![1u8, 2, 3]));
    }

    #[test]
    fn encode_uses_configured_iuid() {
        let cfg = FrameConfig {
            iuid: 42,
            ..FrameConfig::default()
        };
        let mut encoder = FrameEncoder::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        encoder.encode(b"hi", PacketType::Data).unwrap();
        encoder.set_iuid(43);
        encoder.encode(b"", PacketType::Ack).unwrap();

        let mut wire = written(encoder);
        let f1 = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(f1.iuid, 42);
        assert_eq!(f2, Frame::control(43, PacketType::Ack));
    }

    #[test]
    fn control_frames_ignore_payload() {
        let mut encoder = FrameEncoder::new(Cursor::new(Vec::<u8>::new()));
        encoder.encode(b"not sent", PacketType::Nack).unwrap();

        let wire = written(encoder);
        assert_eq!(wire.as_ref(), b"|||\x00n");
    }

    #[test]
    fn oversize_payload_writes_nothing() {
        let mut encoder = FrameEncoder::new(Cursor::new(Vec::<u8>::new()));
        let payload = vec![0u8; MAX_PAYLOAD + 1];

        let err = encoder.encode(&payload, PacketType::Data).unwrap_err();
        assert!(matches!(err, FrameError::LengthOverflow { .. }));
        assert!(written(encoder).is_empty());
    }

    #[test]
    fn configured_limit_is_enforced() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut encoder = FrameEncoder::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = encoder.encode(b"oversized", PacketType::Data).unwrap_err();
        assert!(matches!(err, FrameError::LengthOverflow { size: 9, max: 4 }));

        encoder.encode(b"fits", PacketType::Data).unwrap();
    }

    #[test]
    fn max_length_payload_is_accepted() {
        let mut encoder = FrameEncoder::new(Cursor::new(Vec::<u8>::new()));
        let payload = vec![0x7Cu8; MAX_PAYLOAD];
        encoder.encode(&payload, PacketType::Data).unwrap();

        let mut wire = written(encoder);
        let frame = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload().unwrap().len(), MAX_PAYLOAD);
    }

    #[test]
    fn borrowed_sink_outlives_encoder() {
        let mut sink = Vec::<u8>::new();
        {
            let mut encoder = FrameEncoder::new(&mut sink);
            encoder.encode(b"", PacketType::IdRequest).unwrap();
        }
        assert_eq!(sink, b"|||\x00i");
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut encoder = FrameEncoder::new(sink);

        encoder.encode(b"x", PacketType::Data).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut encoder = FrameEncoder::new(InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        });
        encoder.encode(b"retry", PacketType::Data).unwrap();

        let inner = encoder.into_inner();
        assert_eq!(inner.data.len(), Frame::data(0, &b"retry"[..]).wire_size());
    }

    #[test]
    fn partial_writes_are_completed() {
        let mut encoder = FrameEncoder::new(OneByteWriter { data: Vec::new() });
        encoder.encode(b"slow", PacketType::Data).unwrap();

        let mut wire = BytesMut::from(encoder.into_inner().data.as_slice());
        let frame = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload().unwrap().as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut encoder = FrameEncoder::new(ZeroWriter);
        let err = encoder.encode(b"x", PacketType::Data).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_errors_are_surfaced() {
        let mut encoder = FrameEncoder::new(FailingWriter);
        let err = encoder.encode(b"", PacketType::Ack).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut encoder = FrameEncoder::new(Cursor::new(Vec::<u8>::new()));

        let _ = encoder.get_ref();
        let _ = encoder.get_mut();
        assert_eq!(encoder.config().iuid, 0);
        let _inner = encoder.into_inner();
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct OneByteWriter {
        data: Vec<u8>,
    }

    impl Write for OneByteWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(&b) => {
                    self.data.push(b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
