//! Variable-length integer encoding used throughout the wire codec for
//! vector/string length prefixes.

use std::io::{self, Read, Write};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarIntError {
    #[error("unexpected end of input decoding varint at offset {offset}")]
    Truncated { offset: usize },
}

/// `value < 0xFD` is a single byte; `< 2^16` is `0xFD` + 2 LE bytes;
/// `< 2^32` is `0xFE` + 4 LE bytes; otherwise `0xFF` + 8 LE bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    pub fn new(value: u64) -> Self {
        VarInt(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Size in bytes of this value's encoding.
    pub fn encoded_len(self) -> usize {
        match self.0 {
            0..=0xFC => 1,
            0xFD..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        }
    }

    pub fn write<W: Write>(self, w: &mut W) -> io::Result<()> {
        match self.0 {
            0..=0xFC => w.write_all(&[self.0 as u8]),
            0xFD..=0xFFFF => {
                w.write_all(&[0xFD])?;
                w.write_all(&(self.0 as u16).to_le_bytes())
            }
            0x1_0000..=0xFFFF_FFFF => {
                w.write_all(&[0xFE])?;
                w.write_all(&(self.0 as u32).to_le_bytes())
            }
            _ => {
                w.write_all(&[0xFF])?;
                w.write_all(&self.0.to_le_bytes())
            }
        }
    }

    pub fn read<R: Read>(r: &mut R, offset: usize) -> Result<Self, VarIntError> {
        let mut prefix = [0u8; 1];
        r.read_exact(&mut prefix)
            .map_err(|_| VarIntError::Truncated { offset })?;

        match prefix[0] {
            0xFD => {
                let mut buf = [0u8; 2];
                r.read_exact(&mut buf)
                    .map_err(|_| VarIntError::Truncated { offset: offset + 1 })?;
                Ok(VarInt(u16::from_le_bytes(buf) as u64))
            }
            0xFE => {
                let mut buf = [0u8; 4];
                r.read_exact(&mut buf)
                    .map_err(|_| VarIntError::Truncated { offset: offset + 1 })?;
                Ok(VarInt(u32::from_le_bytes(buf) as u64))
            }
            0xFF => {
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf)
                    .map_err(|_| VarIntError::Truncated { offset: offset + 1 })?;
                Ok(VarInt(u64::from_le_bytes(buf)))
            }
            small => Ok(VarInt(small as u64)),
        }
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: u64) {
        let mut buf = Vec::new();
        VarInt(value).write(&mut buf).unwrap();
        assert_eq!(buf.len(), VarInt(value).encoded_len());
        let mut cursor = &buf[..];
        let decoded = VarInt::read(&mut cursor, 0).unwrap();
        assert_eq!(decoded.value(), value);
    }

    #[test]
    fn boundary_values_roundtrip() {
        for v in [
            0,
            1,
            0xFC,
            0xFD,
            0xFFFF,
            0x1_0000,
            0xFFFF_FFFF,
            0x1_0000_0000,
            u64::MAX,
        ] {
            roundtrip(v);
        }
    }

    #[test]
    fn truncated_input_reports_offset() {
        let buf = [0xFDu8, 0x01]; // claims 2 more bytes, only has 1
        let mut cursor = &buf[..];
        let err = VarInt::read(&mut cursor, 5).unwrap_err();
        assert_eq!(err, VarIntError::Truncated { offset: 6 });
    }
}
