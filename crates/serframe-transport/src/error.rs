/// Errors that can occur on a byte transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The other end of the stream has been dropped.
    #[error("transport closed by peer")]
    Closed,

    /// A thread panicked while holding the shared buffer lock.
    #[error("transport buffer lock poisoned")]
    Poisoned,
}

impl From<TransportError> for std::io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) => io,
            TransportError::Closed => std::io::Error::new(std::io::ErrorKind::BrokenPipe, err),
            TransportError::Poisoned => std::io::Error::other(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
