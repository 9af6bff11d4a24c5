//! 32-byte content hash used for block and transaction identity.
//!
//! Hashes are double-SHA256 throughout (Bitcoin-compatible). Internally a
//! `Hash` stores bytes in the order produced by `Sha256::digest` (little
//! endian, i.e. the wire order); `Display`/`to_hex` reverse them to the
//! conventional big-endian form used by block explorers and the reference
//! client's RPC output.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const LEN: usize = 32;

    pub fn zero() -> Self {
        Hash([0u8; 32])
    }

    /// Bytes in wire/internal order (little-endian, as produced by the
    /// digest). Use `to_hex`/`Display` for the conventional display order.
    pub fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_wire_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Double-SHA256 of `data`.
    pub fn double_sha256(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        Hash(out)
    }

    /// Big-endian display bytes (reverse of wire order).
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(s).map_err(|_| HashError::InvalidHex)?;
        if bytes.len() != 32 {
            return Err(HashError::InvalidLength);
        }
        let mut wire = [0u8; 32];
        wire.copy_from_slice(&bytes);
        wire.reverse();
        Ok(Hash(wire))
    }

    /// Constant-time `self < target`, comparing as big unsigned integers in
    /// display (big-endian) order. Used for the proof-of-work check.
    pub fn meets_target(&self, target: &Hash) -> bool {
        let mut a = self.0;
        let mut b = target.0;
        a.reverse();
        b.reverse();
        for (x, y) in a.iter().zip(b.iter()) {
            if x.ct_eq(y).unwrap_u8() == 1 {
                continue;
            }
            return x < y;
        }
        false
    }
}

impl PartialEq for Hash {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).unwrap_u8() == 1
    }
}

impl std::hash::Hash for Hash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut a = self.0;
        let mut b = other.0;
        a.reverse();
        b.reverse();
        a.cmp(&b)
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("invalid hash length, expected 32 bytes")]
    InvalidLength,
    #[error("invalid hex encoding")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let h = Hash::double_sha256(b"hello");
        let s = h.to_hex();
        let back = Hash::from_hex(&s).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn meets_target_respects_big_endian_ordering() {
        let low = Hash::from_wire_bytes([0u8; 32]);
        let mut high_bytes = [0u8; 32];
        high_bytes[0] = 0xff;
        let high = Hash::from_wire_bytes(high_bytes);

        // low's display form is 00...00, high's is 00...00ff (first byte
        // wire-order maps to the last display byte), so low < high.
        assert!(low.meets_target(&high));
        assert!(!high.meets_target(&low));
    }

    #[test]
    fn equal_hashes_do_not_meet_target() {
        let h = Hash::double_sha256(b"x");
        assert!(!h.meets_target(&h));
    }

    #[test]
    fn double_sha256_is_stable() {
        let a = Hash::double_sha256(b"same input");
        let b = Hash::double_sha256(b"same input");
        assert_eq!(a, b);
    }
}
