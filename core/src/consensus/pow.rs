//! Proof-of-work verification.
//!
//! Mining (nonce search) is out of scope for this client; only the checks
//! a header must satisfy to be accepted are implemented here.

use num_bigint::BigUint;
use thiserror::Error;

use crate::{blockchain::BlockHeader, consensus::difficulty::DifficultyTarget};

/// Verify that a header's hash satisfies its own declared target, and that
/// the declared target itself is within the network's proof-of-work limit.
pub fn verify_proof_of_work(
    header: &BlockHeader,
    pow_limit: &BigUint,
) -> Result<(), PoWError> {
    let target = DifficultyTarget::from_bits(header.bits);

    if !target.is_within_limit(pow_limit) {
        return Err(PoWError::TargetOutOfRange);
    }

    if !target.validates_hash(&header.hash()) {
        return Err(PoWError::HashAboveTarget);
    }

    Ok(())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoWError {
    #[error("declared difficulty target is outside the proof-of-work limit")]
    TargetOutOfRange,
    #[error("block hash does not satisfy its declared target")]
    HashAboveTarget,
}
