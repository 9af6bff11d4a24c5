//! Primitive read/write helpers shared by every message type: fixed-width
//! integers, varint-prefixed byte strings, and hashes.

use std::io::{self, Read, Write};

use crate::{
    crypto::Hash,
    util::VarInt,
    wire::WireError,
};

/// A `Read` wrapper that tracks how many bytes have been consumed, so
/// decode errors can report the offset they occurred at.
pub struct OffsetReader<R> {
    inner: R,
    offset: usize,
}

impl<R: Read> OffsetReader<R> {
    pub fn new(inner: R) -> Self {
        OffsetReader { inner, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        let mut buf = [0u8; 1];
        self.read_exact_tracked(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32, WireError> {
        let mut buf = [0u8; 4];
        self.read_exact_tracked(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, WireError> {
        let mut buf = [0u8; 8];
        self.read_exact_tracked(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, WireError> {
        let mut buf = [0u8; 8];
        self.read_exact_tracked(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_hash(&mut self) -> Result<Hash, WireError> {
        let mut buf = [0u8; 32];
        self.read_exact_tracked(&mut buf)?;
        Ok(Hash::from_wire_bytes(buf))
    }

    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let offset = self.offset;
        let value = VarInt::read(&mut self.inner, offset)?.value();
        // VarInt::read doesn't know about our running offset; account for
        // however many bytes it actually consumed by re-deriving from the
        // encoded length of the decoded value (deterministic given `value`).
        self.offset += VarInt::new(value).encoded_len();
        Ok(value)
    }

    pub fn read_varstring(&mut self) -> Result<String, WireError> {
        let len = self.read_varint()? as usize;
        let mut buf = vec![0u8; len];
        self.read_exact_tracked(&mut buf)?;
        String::from_utf8(buf).map_err(|_| WireError::Malformed {
            offset: self.offset,
            reason: "invalid utf-8 in varstring".to_string(),
        })
    }

    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        let mut buf = vec![0u8; len];
        self.read_exact_tracked(&mut buf)?;
        Ok(buf)
    }

    fn read_exact_tracked(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        self.inner
            .read_exact(buf)
            .map_err(|_| WireError::Truncated {
                offset: self.offset,
            })?;
        self.offset += buf.len();
        Ok(())
    }
}

pub fn write_hash<W: Write>(w: &mut W, hash: &Hash) -> io::Result<()> {
    w.write_all(hash.as_wire_bytes())
}

pub fn write_varstring<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    VarInt::from(s.len()).write(w)?;
    w.write_all(s.as_bytes())
}

pub fn write_varint<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    VarInt::new(value).write(w)
}

/// Implemented by every wire message body (and the block/transaction model
/// types nested inside them) so the codec can serialize without depending on
/// their internals.
pub trait WireEncode {
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf).expect("writing to a Vec never fails");
        buf
    }
}

pub trait WireDecode: Sized {
    fn read_from<R: Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError>;

    fn decode_from_slice(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = OffsetReader::new(bytes);
        Self::read_from(&mut reader)
    }
}
