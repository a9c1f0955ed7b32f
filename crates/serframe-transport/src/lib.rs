//! Byte source and sink primitives for serial framing.
//!
//! Sinks are plain [`std::io::Write`] values. Sources are [`std::io::Read`]
//! values, optionally extended with [`ByteSource`] so a receiver can ask how
//! many bytes are ready before pumping them.
//!
//! [`LoopbackPort`] is an in-memory full-duplex stream that stands in for a
//! serial line between a host and a device (tests, demos, self-checks).

pub mod error;
pub mod loopback;
pub mod traits;

pub use error::{Result, TransportError};
pub use loopback::LoopbackPort;
pub use traits::ByteSource;
