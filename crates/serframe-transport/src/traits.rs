use std::collections::VecDeque;
use std::io::{BufReader, Cursor, Read};

/// A byte source that can report how many bytes are ready to be read.
///
/// Serial receivers pump exactly the number of bytes the port reports as
/// available, so a read never has to wait on a byte that is not there yet.
/// `bytes_available` must not block and must not consume anything.
pub trait ByteSource: Read {
    /// Number of bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> std::io::Result<usize>;
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        let len = self.get_ref().as_ref().len() as u64;
        Ok(len.saturating_sub(self.position()) as usize)
    }
}

impl ByteSource for &[u8] {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        Ok(self.len())
    }
}

impl ByteSource for VecDeque<u8> {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        Ok(self.len())
    }
}

impl<S: ByteSource> ByteSource for BufReader<S> {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        let buffered = self.buffer().len();
        Ok(buffered + self.get_mut().bytes_available()?)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        (**self).bytes_available()
    }
}
