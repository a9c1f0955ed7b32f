use std::fmt;

/// Frame field in which an unexpected byte was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    /// The `"|||"` sync marker.
    Sync,
    /// The packet type tag.
    Type,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameField::Sync => f.write_str("sync"),
            FrameField::Type => f.write_str("type"),
        }
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The expected sync pattern (or a valid type tag) was not found.
    #[error("sync lost: unexpected byte 0x{byte:02x} in {field} field")]
    SyncLost { field: FrameField, byte: u8 },

    /// The payload does not fit the 2-byte length field or the configured limit.
    #[error("payload length overflow ({size} bytes, max {max})")]
    LengthOverflow { size: usize, max: usize },

    /// The received checksum does not match the one computed over the payload.
    #[error("checksum mismatch (received 0x{received:04x}, computed 0x{computed:04x})")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// The source ran dry before the requested number of bytes was read.
    #[error("short read ({received} of {requested} bytes)")]
    ShortRead { requested: usize, received: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received, or the sink
    /// stopped accepting bytes.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors the parser recovers from by hunting for the next sync
    /// marker.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::SyncLost { .. }
                | FrameError::LengthOverflow { .. }
                | FrameError::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_include_offending_values() {
        let err = FrameError::SyncLost {
            field: FrameField::Type,
            byte: 0x3f,
        };
        assert_eq!(err.to_string(), "sync lost: unexpected byte 0x3f in type field");

        let err = FrameError::ChecksumMismatch {
            received: 0x1234,
            computed: 0xbeef,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch (received 0x1234, computed 0xbeef)"
        );
    }

    #[test]
    fn parse_errors_are_recoverable() {
        assert!(FrameError::LengthOverflow { size: 9, max: 4 }.is_recoverable());
        assert!(!FrameError::ShortRead {
            requested: 4,
            received: 1
        }
        .is_recoverable());
        assert!(!FrameError::ConnectionClosed.is_recoverable());
    }
}
