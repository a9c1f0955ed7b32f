use std::cell::Cell;
use std::io::{Cursor, Read};
use std::path::Path;

use serframe_frame::{Frame, FrameParser, FrameReceiver, Result as FrameResult};
use tracing::{debug, warn};

use crate::cmd::encode::decode_hex;
use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = read_input(&args.input)?;
    let bytes = if args.hex {
        decode_hex(&String::from_utf8_lossy(&raw))?
    } else {
        raw
    };
    let total = bytes.len();

    let mut receiver = FrameReceiver::new(
        Cursor::new(bytes),
        FrameParser::with_max_payload(args.max_payload),
    );

    let frames = Cell::new(0usize);
    let errors = Cell::new(0usize);
    let mut on_event = |event: FrameResult<Frame>| match event {
        Ok(frame) => {
            print_frame(&frame, format);
            frames.set(frames.get() + 1);
        }
        Err(err) => {
            errors.set(errors.get() + 1);
            warn!(error = %err, "frame rejected");
        }
    };

    match args.count {
        None => {
            receiver
                .pump_available(&mut on_event)
                .map_err(|err| frame_error("decode", err))?;
        }
        Some(limit) => {
            // One byte at a time so decoding stops right after the last wanted frame.
            while frames.get() < limit && (receiver.get_ref().position() as usize) < total {
                receiver
                    .pump(1, &mut on_event)
                    .map_err(|err| frame_error("decode", err))?;
            }
        }
    }

    let parser = receiver.parser();
    if !parser.is_idle() {
        warn!(state = ?parser.state(), "input ended inside a frame");
    }
    let stats = parser.stats();
    debug!(
        frames = stats.frames,
        errors = stats.errors,
        discarded = stats.discarded,
        "decode finished"
    );

    if errors.get() > 0 {
        Ok(DATA_INVALID)
    } else {
        Ok(SUCCESS)
    }
}

fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    let mut buf = Vec::new();
    if path.as_os_str() == "-" {
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|err| io_error("read stdin", err))?;
    } else {
        buf = std::fs::read(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
    }
    Ok(buf)
}
