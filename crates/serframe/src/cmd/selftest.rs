use serde::Serialize;
use serframe_frame::{
    checksum, ByteParser, Frame, FrameEncoder, FrameError, FrameParser, FrameReceiver, PacketType,
    CONTROL_FRAME_SIZE, SYNC_MARKER,
};
use serframe_transport::LoopbackPort;
use tracing::debug;

use crate::cmd::SelftestArgs;
use crate::exit::{frame_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn from_outcome(name: &'static str, outcome: Result<String, String>) -> Self {
        match outcome {
            Ok(detail) => Self {
                name,
                status: CheckStatus::Pass,
                detail,
            },
            Err(detail) => Self {
                name,
                status: CheckStatus::Fail,
                detail,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SelftestOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: SelftestArgs, format: OutputFormat) -> CliResult<i32> {
    let round_trip = loopback_round_trip(args.frames, usize::from(args.payload_size))?;

    let checks = vec![
        CheckResult::from_outcome("checksum_reference", checksum_reference()),
        CheckResult::from_outcome("control_frame_size", control_frame_size()),
        CheckResult::from_outcome("loopback_round_trip", round_trip),
        CheckResult::from_outcome("corruption_detected", corruption_detected()),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let output = SelftestOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };
    print_selftest(&output, format);

    if has_fail {
        Ok(FAILURE)
    } else {
        Ok(SUCCESS)
    }
}

fn checksum_reference() -> Result<String, String> {
    let crc = checksum(b"123456789");
    if crc == 0xBB3D {
        Ok("CRC-16/ARC(\"123456789\") = 0xbb3d".to_string())
    } else {
        Err(format!("expected 0xbb3d, computed 0x{crc:04x}"))
    }
}

fn control_frame_size() -> Result<String, String> {
    for kind in PacketType::ALL.into_iter().filter(|k| !k.carries_payload()) {
        let mut encoder = FrameEncoder::new(Vec::new());
        encoder
            .encode(&[], kind)
            .map_err(|err| format!("{kind}: {err}"))?;
        let len = encoder.get_ref().len();
        if len != CONTROL_FRAME_SIZE {
            return Err(format!("{kind} encoded to {len} bytes"));
        }
    }
    Ok(format!("control frames are {CONTROL_FRAME_SIZE} bytes"))
}

/// Payload of `size` bytes with the sync marker embedded in the middle.
fn test_payload(seq: usize, size: usize) -> Vec<u8> {
    let mut payload: Vec<u8> = (0..size).map(|i| ((seq * 31 + i * 7) % 251) as u8).collect();
    if size >= SYNC_MARKER.len() {
        let at = (size - SYNC_MARKER.len()) / 2;
        payload[at..at + SYNC_MARKER.len()].copy_from_slice(&SYNC_MARKER);
    }
    payload
}

fn expected_frames(count: usize, payload_size: usize) -> Vec<Frame> {
    let controls: Vec<PacketType> = PacketType::ALL
        .into_iter()
        .filter(|k| !k.carries_payload())
        .collect();
    (0..count)
        .flat_map(|seq| {
            let iuid = seq as u8;
            [
                Frame::data(iuid, test_payload(seq, payload_size)),
                Frame::control(iuid, controls[seq % controls.len()]),
            ]
        })
        .collect()
}

fn loopback_round_trip(count: usize, payload_size: usize) -> CliResult<Result<String, String>> {
    let (host, device) = LoopbackPort::pair();
    let mut encoder = FrameEncoder::new(host);
    let mut receiver = FrameReceiver::new(device, FrameParser::new());

    let sent = expected_frames(count, payload_size);
    let mut received = Vec::with_capacity(sent.len());
    let mut rejected = Vec::new();

    for frame in &sent {
        encoder
            .send(frame)
            .map_err(|err| frame_error("selftest send", err))?;
        receiver
            .pump_available(|event| match event {
                Ok(frame) => received.push(frame),
                Err(err) => rejected.push(err.to_string()),
            })
            .map_err(|err| frame_error("selftest receive", err))?;
    }

    let leftover = receiver
        .get_ref()
        .pending()
        .map_err(|err| transport_error("selftest loopback", err))?;

    let stats = receiver.parser().stats();
    debug!(
        frames = stats.frames,
        errors = stats.errors,
        discarded = stats.discarded,
        "loopback round trip finished"
    );

    if leftover > 0 || !receiver.parser().is_idle() {
        return Ok(Err(format!("{leftover} bytes left unparsed")));
    }
    if let Some(err) = rejected.first() {
        return Ok(Err(format!("{} frames rejected, first: {err}", rejected.len())));
    }
    if received != sent {
        return Ok(Err(format!(
            "sent {} frames, received {} (mismatched content)",
            sent.len(),
            received.len()
        )));
    }
    Ok(Ok(format!(
        "{} frames ({} DATA of {payload_size} bytes) round-tripped",
        sent.len(),
        count
    )))
}

fn corruption_detected() -> Result<String, String> {
    let mut encoder = FrameEncoder::new(Vec::new());
    encoder
        .encode_with_iuid(1, b"corrupt me", PacketType::Data)
        .map_err(|err| err.to_string())?;
    let mut wire = encoder.into_inner();
    // First payload byte follows the 5-byte header and the 2-byte length.
    wire[CONTROL_FRAME_SIZE + 2] ^= 0x01;

    let mut parser = FrameParser::new();
    let outcome = wire.iter().find_map(|&byte| parser.parse_byte(byte));
    match outcome {
        Some(Err(FrameError::ChecksumMismatch { received, computed })) => Ok(format!(
            "flipped bit caught (received 0x{received:04x}, computed 0x{computed:04x})"
        )),
        Some(Err(err)) => Err(format!("unexpected error: {err}")),
        Some(Ok(_)) => Err("corrupted frame was accepted".to_string()),
        None => Err("parser produced no event".to_string()),
    }
}

fn print_selftest(output: &SelftestOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("serframe selftest\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
    }
}
