use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// In-memory serial port that replays queued device output and records
/// everything the host writes.
#[derive(Debug, Default)]
pub struct MemoryPort {
    incoming: VecDeque<Vec<u8>>,
    pub sent: Vec<u8>,
    closed: bool,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one read's worth of device output.
    pub fn queue(&mut self, chunk: impl AsRef<[u8]>) {
        self.incoming.push_back(chunk.as_ref().to_vec());
    }

    /// Once the queue drains, reads report end of stream as an unplugged
    /// port does.
    pub fn close_when_drained(&mut self) {
        self.closed = true;
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.incoming.pop_front() else {
            if self.closed {
                return Ok(0);
            }
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data queued"));
        };

        let read = chunk.len().min(buf.len());
        buf[..read].copy_from_slice(&chunk[..read]);
        if read < chunk.len() {
            self.incoming.push_front(chunk.split_off(read));
        }
        Ok(read)
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sent.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_chunks_larger_than_the_buffer() {
        let mut port = MemoryPort::new();
        port.queue(b"abcdef");

        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn empty_queue_times_out_until_closed() {
        let mut port = MemoryPort::new();
        let mut buf = [0u8; 4];
        assert_eq!(
            port.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::TimedOut
        );

        port.close_when_drained();
        assert_eq!(port.read(&mut buf).unwrap(), 0);
    }
}
