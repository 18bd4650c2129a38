use std::{fs::File, io::Write};

use crate::packet::EncodedPacket;

pub type PacketCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Where encoded packets go.
pub enum PacketSink {
    /// Every packet is written out completely; partial writes are retried
    /// until all bytes are accepted or the writer fails.
    Writer(Box<dyn Write + Send>),
    /// Fire and forget: the callback receives the packet bytes, nothing is
    /// retried.
    Callback(PacketCallback),
}

impl PacketSink {
    pub fn writer<W: Write + Send + 'static>(writer: W) -> Self {
        PacketSink::Writer(Box::new(writer))
    }

    pub fn file(file: File) -> Self {
        PacketSink::Writer(Box::new(file))
    }

    #[cfg(unix)]
    pub fn from_fd(fd: std::os::fd::OwnedFd) -> Self {
        PacketSink::file(File::from(fd))
    }

    pub fn callback<F: FnMut(&[u8]) + Send + 'static>(callback: F) -> Self {
        PacketSink::Callback(Box::new(callback))
    }

    pub fn write_packet(&mut self, packet: &EncodedPacket) -> std::io::Result<()> {
        match self {
            PacketSink::Writer(writer) => writer.write_all(packet.data()),
            PacketSink::Callback(callback) => {
                callback(packet.data());
                Ok(())
            }
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match self {
            PacketSink::Writer(writer) => writer.flush(),
            PacketSink::Callback(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for PacketSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketSink::Writer(_) => f.write_str("PacketSink::Writer"),
            PacketSink::Callback(_) => f.write_str("PacketSink::Callback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// Accepts at most `chunk` bytes per call and fails after `fail_after`
    /// calls.
    struct ChunkedWriter {
        out: Arc<Mutex<Vec<u8>>>,
        chunk: usize,
        calls: usize,
        fail_after: Option<usize>,
    }

    impl Write for ChunkedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if let Some(limit) = self.fail_after {
                if self.calls > limit {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
                }
            }
            let n = buf.len().min(self.chunk);
            self.out.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_retries_partial_writes() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let mut sink = PacketSink::writer(ChunkedWriter {
            out: out.clone(),
            chunk: 3,
            calls: 0,
            fail_after: None,
        });
        let payload: Vec<u8> = (0..100u8).collect();
        sink.write_packet(&EncodedPacket::new(payload.clone(), Some(0), Some(0), true))
            .unwrap();
        assert_eq!(*out.lock().unwrap(), payload);
    }

    #[test]
    fn test_writer_surfaces_io_error() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let mut sink = PacketSink::writer(ChunkedWriter {
            out: out.clone(),
            chunk: 4,
            calls: 0,
            fail_after: Some(2),
        });
        let err = sink
            .write_packet(&EncodedPacket::new(vec![1u8; 32], None, None, false))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(out.lock().unwrap().len(), 8);
    }

    #[test]
    fn test_callback_receives_bytes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut sink = PacketSink::callback(move |buf| {
            seen_clone.lock().unwrap().push(buf.to_vec());
        });
        sink.write_packet(&EncodedPacket::new(vec![1, 2, 3], Some(0), None, true))
            .unwrap();
        sink.write_packet(&EncodedPacket::new(vec![4], Some(1), None, false))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2, 3], vec![4]]);
    }
}
