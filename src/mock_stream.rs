use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};

/// An in-memory transport that replays a scripted server transcript and records what the
/// client writes.
///
/// Once the transcript is used up, reads report end of stream with `Ok(0)`, the way a socket
/// closed by the server does.
#[derive(Debug, Default)]
pub struct MockStream {
    transcript: Vec<u8>,
    consumed: usize,
    pub written_buf: Vec<u8>,
    broken: bool,
    trickle: usize,
}

impl MockStream {
    pub fn new(transcript: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(transcript)
    }

    pub fn with_buf(mut self, transcript: Vec<u8>) -> MockStream {
        self.transcript = transcript;
        self
    }

    /// Fail every read, as a reset connection does.
    pub fn with_err(mut self) -> MockStream {
        self.broken = true;
        self
    }

    /// Hand out the first few reads one byte at a time.
    pub fn with_delay(mut self) -> MockStream {
        self.trickle = 4;
        self
    }

    /// Whether the client has read the whole transcript.
    pub fn is_drained(&self) -> bool {
        self.consumed == self.transcript.len()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.broken {
            return Err(Error::new(ErrorKind::ConnectionReset, "connection reset"));
        }
        let mut remaining = &self.transcript[self.consumed..];
        let mut limit = buf.len();
        if self.trickle > 0 {
            self.trickle -= 1;
            limit = min(limit, 1);
        }
        let n = remaining.read(&mut buf[..limit])?;
        self.consumed += n;
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written_buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
