use std::path::Path;

use serde::Serialize;
use serframe_frame::{checksum, FrameEncoder, PacketType};
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_raw, OutputFormat};

#[derive(Debug, Serialize)]
struct EncodeOutput {
    iuid: u8,
    #[serde(rename = "type")]
    packet_type: &'static str,
    payload_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    wire_size: usize,
    frame_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let packet_type = PacketType::from(args.kind);
    let payload = load_payload(&args)?;

    if !packet_type.carries_payload() && !payload.is_empty() {
        return Err(CliError::new(
            USAGE,
            format!("{packet_type} frames carry no payload"),
        ));
    }

    let mut encoder = FrameEncoder::new(Vec::new());
    encoder
        .encode_with_iuid(args.iuid, &payload, packet_type)
        .map_err(|err| frame_error("encode", err))?;
    let wire = encoder.into_inner();
    debug!(iuid = args.iuid, %packet_type, bytes = wire.len(), "encoded frame");

    if let Some(path) = &args.output {
        std::fs::write(path, &wire)
            .map_err(|err| io_error(&format!("write {}", path.display()), err))?;
    } else if matches!(format, OutputFormat::Raw) {
        print_raw(&wire);
        return Ok(SUCCESS);
    }

    let out = EncodeOutput {
        iuid: args.iuid,
        packet_type: packet_type.name(),
        payload_size: payload.len(),
        checksum: packet_type
            .carries_payload()
            .then(|| format!("0x{:04x}", checksum(&payload))),
        wire_size: wire.len(),
        frame_hex: hex::encode(&wire),
        output: args.output.as_deref().map(|p| p.display().to_string()),
    };
    print_encode(&out, format);

    Ok(SUCCESS)
}

fn load_payload(args: &EncodeArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(text) = &args.hex {
        return decode_hex(text);
    }
    if let Some(path) = &args.file {
        return read_file(path);
    }
    Ok(Vec::new())
}

pub(crate) fn decode_hex(text: &str) -> CliResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex: {err}")))
}

fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| io_error(&format!("read {}", path.display()), err))
}

fn print_encode(out: &EncodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "iuid={} type={} size={} wire={} checksum={}",
                out.iuid,
                out.packet_type,
                out.payload_size,
                out.wire_size,
                out.checksum.as_deref().unwrap_or("-")
            );
            println!("{}", out.frame_hex);
            if let Some(path) = &out.output {
                println!("written to {path}");
            }
        }
        OutputFormat::Raw => {
            println!("{}", out.frame_hex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_payload_ignores_whitespace() {
        assert_eq!(decode_hex("01 02\n03").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn bad_hex_is_data_invalid() {
        let err = decode_hex("0g").unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
