//! Framed host/device messaging over byte-oriented serial streams.
//!
//! serframe frames discrete messages with a `"|||"` sync marker, a one-byte
//! iuid, a one-byte packet type and, for DATA packets, a length-prefixed
//! payload protected by a CRC-16.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte source/sink primitives (availability query, in-memory loopback)
//! - [`frame`]: Wire format, encoder, receiver and incremental parser

/// Re-export transport types.
pub mod transport {
    pub use serframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serframe_frame::*;
}
