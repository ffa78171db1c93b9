//! Big-endian wire primitives
//!
//! Extension traits over [`std::io::Read`] / [`std::io::Write`] providing
//! the primitive encodings the protocol is built from: big-endian
//! integers and IEEE-754 floats in network byte order, single-byte
//! booleans, and UTF-8 strings with a leading big-endian `u16` length.

use std::io::{self, Read, Write};

/// Write-side wire primitives
pub trait WireWrite: Write {
    /// Write a single byte
    fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.write_all(&[v])
    }

    /// Write a big-endian `i32`
    fn write_i32(&mut self, v: i32) -> io::Result<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// Write a big-endian `u32`
    fn write_u32(&mut self, v: u32) -> io::Result<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// Write a big-endian `i64`
    fn write_i64(&mut self, v: i64) -> io::Result<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// Write an `f32` in network byte order
    fn write_f32(&mut self, v: f32) -> io::Result<()> {
        self.write_all(&v.to_bits().to_be_bytes())
    }

    /// Write an `f64` in network byte order
    fn write_f64(&mut self, v: f64) -> io::Result<()> {
        self.write_all(&v.to_bits().to_be_bytes())
    }

    /// Write a boolean as one byte (1 = true, 0 = false)
    fn write_bool(&mut self, v: bool) -> io::Result<()> {
        self.write_u8(v as u8)
    }

    /// Write a UTF-8 string with a leading big-endian `u16` byte length
    fn write_utf(&mut self, s: &str) -> io::Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "string too long for u16-prefixed encoding",
            ));
        }
        self.write_all(&(bytes.len() as u16).to_be_bytes())?;
        self.write_all(bytes)
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

/// Read-side wire primitives
pub trait WireRead: Read {
    /// Read a single byte
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a big-endian `i32`
    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read a big-endian `u32`
    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Read a big-endian `i64`
    fn read_i64(&mut self) -> io::Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Read an `f32` in network byte order
    fn read_f32(&mut self) -> io::Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_bits(u32::from_be_bytes(buf)))
    }

    /// Read an `f64` in network byte order
    fn read_f64(&mut self) -> io::Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_bits(u64::from_be_bytes(buf)))
    }

    /// Read a boolean (any nonzero byte is true)
    fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a UTF-8 string with a leading big-endian `u16` byte length
    fn read_utf(&mut self) -> io::Result<String> {
        let mut len_buf = [0u8; 2];
        self.read_exact(&mut len_buf)?;
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut bytes = vec![0u8; len];
        self.read_exact(&mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 string payload"))
    }
}

impl<R: Read + ?Sized> WireRead for R {}
