//! Bounded in-memory pipe connecting cascade layer workers.
//!
//! One producer, one consumer. Backpressure is cooperative: the writer
//! blocks once `depth` chunks are in flight. Dropping the writer signals
//! clean EOF; [`PipeWriter::fail`] closes the pipe carrying an error, which
//! the reader surfaces after draining buffered chunks. Dropping the reader
//! makes further writes fail with `BrokenPipe`, which unwinds an entire
//! pipeline once any stage aborts.

use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

pub(crate) fn pipe(depth: usize) -> (PipeReader, PipeWriter) {
    let (tx, rx) = sync_channel(depth);
    (
        PipeReader {
            rx,
            current: Vec::new(),
            pos: 0,
        },
        PipeWriter { tx },
    )
}

pub(crate) struct PipeWriter {
    tx: SyncSender<io::Result<Vec<u8>>>,
}

impl PipeWriter {
    /// Close the pipe with an error instead of clean EOF.
    pub(crate) fn fail(self, err: io::Error) {
        let _ = self.tx.send(Err(err));
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(Ok(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) struct PipeReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    current: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.current.len() {
                let n = buf.len().min(self.current.len() - self.pos);
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(err)) => return Err(err),
                // Writer dropped without an error: clean EOF.
                Err(_) => return Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::thread;

    #[test]
    fn test_roundtrip_across_threads() {
        let (mut reader, mut writer) = pipe(4);
        let handle = thread::spawn(move || {
            for chunk in [b"alpha".as_slice(), b"beta", b"gamma"] {
                writer.write_all(chunk).unwrap();
            }
        });
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        handle.join().unwrap();
        assert_eq!(out, b"alphabetagamma");
    }

    #[test]
    fn test_fail_surfaces_error_after_buffered_data() {
        let (mut reader, mut writer) = pipe(4);
        writer.write_all(b"partial").unwrap();
        writer.fail(io::Error::new(io::ErrorKind::Other, "layer fault"));

        let mut buf = [0u8; 7];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"partial");

        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.to_string(), "layer fault");
    }

    #[test]
    fn test_write_after_reader_drop_is_broken_pipe() {
        let (reader, mut writer) = pipe(1);
        drop(reader);
        let err = writer.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
