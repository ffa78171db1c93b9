//! Framed deflate stream compression
//!
//! The optional wire compression wraps the socket in a pair of framed
//! deflate streams. Each `flush` on the write side compresses everything
//! buffered since the previous flush into one deflate block and emits it
//! as a length-prefixed frame, so a flushed request is fully decodable
//! on the peer without waiting for more bytes. The read side inflates
//! one frame at a time on demand.
//!
//! Both ends must agree on compression; the frames are not
//! self-identifying.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::codec::wire::{WireRead, WireWrite};

/// Largest accepted compressed frame, a sanity bound against a
/// corrupted or misaligned stream
const MAX_FRAME: u32 = 1 << 28;

/// Write side of the framed deflate stream
pub struct CompressingWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> CompressingWriter<W> {
    /// Wrap a writer; bytes are buffered until the next flush
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    fn flush_frame(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&self.buf)?;
        let payload = encoder.finish()?;
        self.inner.write_u32(payload.len() as u32)?;
        self.inner.write_all(&payload)?;
        self.buf.clear();
        Ok(())
    }
}

impl<W: Write> Write for CompressingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_frame()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for CompressingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush_frame();
        let _ = self.inner.flush();
    }
}

/// Read side of the framed deflate stream
pub struct CompressingReader<R: Read> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> CompressingReader<R> {
    /// Wrap a reader producing frames written by [`CompressingWriter`]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let len = self.inner.read_u32()?;
        if len > MAX_FRAME {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("compressed frame of {len} bytes exceeds the frame limit"),
            ));
        }
        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload)?;
        self.buf.clear();
        self.pos = 0;
        DeflateDecoder::new(&payload[..]).read_to_end(&mut self.buf)?;
        Ok(())
    }
}

impl<R: Read> Read for CompressingReader<R> {
    fn read(&mut self, dest: &mut [u8]) -> io::Result<usize> {
        if dest.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.buf.len() {
            self.fill()?;
        }
        let available = &self.buf[self.pos..];
        let n = available.len().min(dest.len());
        dest[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}
