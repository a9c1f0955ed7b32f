use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::ByteSource;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// One direction of a loopback link.
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

struct PipeState {
    buf: BytesMut,
    writer_open: bool,
    reader_open: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState {
                buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
                writer_open: true,
                reader_open: true,
            }),
            ready: Condvar::new(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, PipeState>> {
        self.state.lock().map_err(|_| TransportError::Poisoned)
    }
}

/// In-memory full-duplex byte stream.
///
/// Created in pairs: bytes written to one port are read, in order, from the
/// other. Reads block until data arrives or the peer port is dropped (EOF).
/// In non-blocking mode an empty read fails with `WouldBlock` instead.
pub struct LoopbackPort {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    nonblocking: bool,
}

impl LoopbackPort {
    /// Create two connected ports.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Pipe::new();
        let b_to_a = Pipe::new();
        let a = Self {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            nonblocking: false,
        };
        let b = Self {
            rx: a_to_b,
            tx: b_to_a,
            nonblocking: false,
        };
        debug!("created loopback port pair");
        (a, b)
    }

    /// Switch between blocking and non-blocking reads.
    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.nonblocking = nonblocking;
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// Bytes queued for this port to read.
    pub fn pending(&self) -> Result<usize> {
        Ok(self.rx.lock()?.buf.len())
    }

    /// True once the peer port has been dropped.
    pub fn is_peer_closed(&self) -> Result<bool> {
        Ok(!self.rx.lock()?.writer_open)
    }

    fn read_into(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.rx.lock()?;
        loop {
            if !state.buf.is_empty() {
                let n = state.buf.len().min(buf.len());
                buf[..n].copy_from_slice(&state.buf[..n]);
                state.buf.advance(n);
                trace!(bytes = n, "loopback read");
                return Ok(n);
            }
            if !state.writer_open {
                return Ok(0);
            }
            if self.nonblocking {
                return Err(TransportError::Io(std::io::Error::from(
                    ErrorKind::WouldBlock,
                )));
            }
            state = self
                .rx
                .ready
                .wait(state)
                .map_err(|_| TransportError::Poisoned)?;
        }
    }

    fn write_from(&self, buf: &[u8]) -> Result<usize> {
        let mut state = self.tx.lock()?;
        if !state.reader_open {
            return Err(TransportError::Closed);
        }
        state.buf.extend_from_slice(buf);
        trace!(bytes = buf.len(), "loopback write");
        drop(state);
        self.tx.ready.notify_all();
        Ok(buf.len())
    }
}

impl Read for LoopbackPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_into(buf).map_err(Into::into)
    }
}

impl Write for LoopbackPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_from(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl ByteSource for LoopbackPort {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        self.pending().map_err(Into::into)
    }
}

impl Drop for LoopbackPort {
    fn drop(&mut self) {
        if let Ok(mut state) = self.tx.lock() {
            state.writer_open = false;
        }
        self.tx.ready.notify_all();
        if let Ok(mut state) = self.rx.lock() {
            state.reader_open = false;
        }
        debug!("loopback port closed");
    }
}

impl std::fmt::Debug for LoopbackPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackPort")
            .field("nonblocking", &self.nonblocking)
            .finish()
    }
}
