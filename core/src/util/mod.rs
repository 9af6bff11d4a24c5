//! Cross-cutting primitives shared by the wire codec, chain engine, and peer
//! state machine: varint encoding, compact-bits target masking, a countdown
//! latch for sync progress, and a hashable fixed-size byte key.

mod latch;
mod varint;

pub use latch::CountdownLatch;
pub use varint::{VarInt, VarIntError};

/// A fixed-size byte buffer usable as a `HashMap` key without re-hashing its
/// full contents on every lookup the way a `Vec<u8>` would incur allocation
/// churn for. Used wherever a raw 32-byte hash needs to key a map but callers
/// should not depend on a particular `Hash` newtype being in scope (mirrors
/// the teacher's approach of keying chain maps by `[u8; N]` directly).
pub type ByteKey32 = [u8; 32];

/// Mask a 256-bit big-endian target to the precision the compact ("bits")
/// wire form can represent: the mantissa keeps only its top 3 bytes once an
/// exponent byte count is chosen, so re-expanding a compact value and
/// re-encoding it must reproduce the identical bytes. Used by the difficulty
/// retarget check (`consensus::difficulty`) to verify bit-for-bit
/// reproducibility rather than approximate numeric equality, per the
/// precision-mask design note.
pub fn mask_to_compact_precision(target: &[u8; 32]) -> [u8; 32] {
    use crate::consensus::difficulty::DifficultyTarget;
    let bits = DifficultyTarget::from_bytes(*target).to_bits();
    DifficultyTarget::from_bits(bits).to_bytes()
}
