//! Byte reader with push-back

use std::io::{self, Read};

/// Reader that lets the caller return bytes it has already read
///
/// Fixed-width formats are scanned by reading a record's leading bytes,
/// deciding what the record is, and pushing those bytes back.
#[derive(Debug)]
pub struct PushbackReader<R> {
    inner: R,
    pushed: Vec<u8>,
    position: usize,
}

impl<R: Read> PushbackReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushed: Vec::new(),
            position: 0,
        }
    }

    /// Bytes consumed so far, net of push-back
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read one byte; `None` at end of input
    ///
    /// # Errors
    ///
    /// Propagates errors from the underlying reader.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pushed.pop() {
            self.position += 1;
            return Ok(Some(byte));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Read up to `n` bytes, fewer only at end of input
    ///
    /// # Errors
    ///
    /// Propagates errors from the underlying reader.
    pub fn read_up_to(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.read_byte()? {
                Some(byte) => out.push(byte),
                None => break,
            }
        }
        Ok(out)
    }

    /// Look at the next byte without consuming it
    ///
    /// # Errors
    ///
    /// Propagates errors from the underlying reader.
    pub fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.read_byte()?;
        if let Some(b) = byte {
            self.unread(&[b]);
        }
        Ok(byte)
    }

    /// Return `bytes` to the front of the stream, in order
    pub fn unread(&mut self, bytes: &[u8]) {
        self.pushed.extend(bytes.iter().rev());
        self.position = self.position.saturating_sub(bytes.len());
    }
}
