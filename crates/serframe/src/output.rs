use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serframe_frame::Frame;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct FrameOutput {
    pub iuid: u8,
    #[serde(rename = "type")]
    pub packet_type: &'static str,
    pub tag: String,
    pub payload_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub wire_size: usize,
}

impl FrameOutput {
    pub fn from_frame(frame: &Frame) -> Self {
        let payload = frame.payload();
        Self {
            iuid: frame.iuid,
            packet_type: frame.packet_type().name(),
            tag: char::from(frame.packet_type().tag()).to_string(),
            payload_size: payload.map_or(0, |p| p.len()),
            payload: payload.map(|p| payload_preview(p)),
            payload_hex: payload.map(hex::encode),
            checksum: frame.checksum().map(|c| format!("0x{c:04x}")),
            wire_size: frame.wire_size(),
        }
    }
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let out = FrameOutput::from_frame(frame);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["IUID", "TYPE", "SIZE", "CHECKSUM", "PAYLOAD"])
                .add_row(vec![
                    out.iuid.to_string(),
                    out.packet_type.to_string(),
                    out.payload_size.to_string(),
                    out.checksum.clone().unwrap_or_else(|| "-".to_string()),
                    out.payload.clone().unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match &out.payload {
            Some(payload) => println!(
                "iuid={} type={} size={} checksum={} payload={}",
                out.iuid,
                out.packet_type,
                out.payload_size,
                out.checksum.as_deref().unwrap_or("-"),
                payload
            ),
            None => println!("iuid={} type={}", out.iuid, out.packet_type),
        },
        OutputFormat::Raw => {
            if let Some(payload) = frame.payload() {
                print_raw(payload);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
