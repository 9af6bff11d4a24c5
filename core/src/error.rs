//! Crate-level error aggregation.
//!
//! Each module owns its own error enum for the failure kinds it can produce;
//! this type exists so call sites that cross module boundaries (the peer
//! reader task feeding blocks to the chain and the chain feeding transactions
//! to the wallet, chiefly) can propagate with a single `?` without every
//! module depending on every other module's error type.

use thiserror::Error;

use crate::{
    blockchain::{ChainError, MerkleError, VerificationError},
    network::{NetworkError, PeerError},
    wallet::WalletError,
    wire::WireError,
};

#[derive(Error, Debug)]
pub enum SvpError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SvpResult<T> = Result<T, SvpError>;
