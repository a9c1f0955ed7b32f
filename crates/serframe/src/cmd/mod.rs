use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use serframe_frame::{PacketType, MAX_PAYLOAD};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod selftest;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a single frame.
    Encode(EncodeArgs),
    /// Decode frames from a captured byte stream.
    Decode(DecodeArgs),
    /// Round-trip frames through an in-memory loopback port.
    Selftest(SelftestArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Selftest(args) => selftest::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Packet kinds as spelled on the command line.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PacketKind {
    Data,
    Ack,
    Nack,
    IdRequest,
    IdResponse,
}

impl From<PacketKind> for PacketType {
    fn from(kind: PacketKind) -> Self {
        match kind {
            PacketKind::Data => PacketType::Data,
            PacketKind::Ack => PacketType::Ack,
            PacketKind::Nack => PacketType::Nack,
            PacketKind::IdRequest => PacketType::IdRequest,
            PacketKind::IdResponse => PacketType::IdResponse,
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Packet type.
    #[arg(long = "type", short = 't', value_enum, default_value = "data")]
    pub kind: PacketKind,
    /// Identifier stamped on the frame.
    #[arg(long, default_value = "0")]
    pub iuid: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Write the encoded frame to this file instead of printing it.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file, or "-" for stdin.
    pub input: PathBuf,
    /// Treat the input as hex text (whitespace ignored).
    #[arg(long)]
    pub hex: bool,
    /// Stop after decoding N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reject DATA frames with payloads larger than this.
    #[arg(long, default_value_t = MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct SelftestArgs {
    /// Number of DATA frames to round-trip.
    #[arg(long, default_value = "16")]
    pub frames: usize,
    /// Payload size of each DATA frame.
    #[arg(long, default_value = "64")]
    pub payload_size: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
