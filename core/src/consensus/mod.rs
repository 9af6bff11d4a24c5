//! Proof-of-work and difficulty-retargeting rules shared by block
//! verification (`blockchain::block`) and the chain engine
//! (`blockchain::chain`).

pub mod difficulty;
pub mod pow;

pub use difficulty::{DifficultyError, DifficultyTarget};
pub use pow::{verify_proof_of_work, PoWError};

/// Consensus constants not tied to a specific network parameter set.
pub mod constants {
    /// Maximum future block time (2 hours), per the header time-bound check.
    pub const MAX_FUTURE_BLOCK_TIME_SECS: u64 = 7200;
}
