//! Little-endian primitive readers and writers used by the command codec and
//! the segment store.

use std::io::{self, Read, Write};

pub trait WireRead {
    fn read_i8(&mut self) -> io::Result<i8>;
    fn read_u8(&mut self) -> io::Result<u8>;
    fn read_u32_le(&mut self) -> io::Result<u32>;
    fn read_f32_le(&mut self) -> io::Result<f32>;
    /// Reads a `u32` byte length followed by that many UTF-8 bytes.
    fn read_prefixed_str(&mut self) -> io::Result<String>;
}

impl<R: Read + ?Sized> WireRead for R {
    fn read_i8(&mut self) -> io::Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_f32_le(&mut self) -> io::Result<f32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_prefixed_str(&mut self) -> io::Result<String> {
        let len = self.read_u32_le()? as usize;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

pub trait WireWrite {
    fn write_i8(&mut self, value: i8) -> io::Result<()>;
    fn write_u8(&mut self, value: u8) -> io::Result<()>;
    fn write_u32_le(&mut self, value: u32) -> io::Result<()>;
    fn write_f32_le(&mut self, value: f32) -> io::Result<()>;
    fn write_prefixed_str(&mut self, value: &str) -> io::Result<()>;
}

impl<W: Write + ?Sized> WireWrite for W {
    fn write_i8(&mut self, value: i8) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    fn write_u32_le(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_f32_le(&mut self, value: f32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_prefixed_str(&mut self, value: &str) -> io::Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.write_u32_le(len)?;
        self.write_all(value.as_bytes())
    }
}

/// Encoded size of a length-prefixed string.
pub fn prefixed_str_len(value: &str) -> u64 {
    4 + value.len() as u64
}
