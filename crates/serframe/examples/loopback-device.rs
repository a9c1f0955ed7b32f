//! Host/device conversation over in-memory loopback ports.
//!
//! One pair carries host-to-device traffic and another the replies, the way a
//! serial line has separate TX and RX wires. The device answers ID requests,
//! acknowledges every DATA frame and NACKs anything that fails to parse.
//!
//! Run: cargo run -p serframe --example loopback-device

use std::thread;

use serframe::frame::{Frame, FrameEncoder, FrameError, FrameParser, FrameReceiver, PacketType};
use serframe::transport::LoopbackPort;

fn device(rx: LoopbackPort, tx: LoopbackPort) -> Result<(), FrameError> {
    let mut receiver = FrameReceiver::new(rx, FrameParser::new());
    let mut encoder = FrameEncoder::new(tx);

    loop {
        let frame = match receiver.recv_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(()),
            Err(err) if err.is_recoverable() => {
                encoder.encode(&[], PacketType::Nack)?;
                continue;
            }
            Err(err) => return Err(err),
        };

        match frame.packet_type() {
            PacketType::IdRequest => {
                encoder.send(&Frame::control(frame.iuid, PacketType::IdResponse))?
            }
            PacketType::Data => encoder.send(&Frame::control(frame.iuid, PacketType::Ack))?,
            PacketType::Ack | PacketType::Nack | PacketType::IdResponse => {}
        }
    }
}

fn main() -> Result<(), FrameError> {
    let (host_tx, device_rx) = LoopbackPort::pair();
    let (device_tx, host_rx) = LoopbackPort::pair();
    let handle = thread::spawn(move || device(device_rx, device_tx));

    let mut encoder = FrameEncoder::new(host_tx);
    let mut receiver = FrameReceiver::new(host_rx, FrameParser::new());

    encoder.send(&Frame::control(1, PacketType::IdRequest))?;
    let reply = receiver.recv_frame()?;
    println!("iuid={} -> {}", reply.iuid, reply.packet_type());

    for (iuid, text) in [(2u8, "temperature=21.5"), (3, "marker ||| inside")] {
        encoder.send(&Frame::data(iuid, text.as_bytes().to_vec()))?;
        let reply = receiver.recv_frame()?;
        println!("iuid={} -> {}", reply.iuid, reply.packet_type());
    }

    drop(encoder);
    match handle.join() {
        Ok(result) => result,
        Err(_) => {
            eprintln!("device thread panicked");
            Ok(())
        }
    }
}
