//! Blockchain data structures: blocks, transactions, the Merkle tree, the
//! in-memory block store, and the chain-sync engine that connects them.

use std::fmt;

use num_bigint::BigUint;

pub mod block;
pub mod chain;
pub mod genesis;
pub mod merkle;
pub mod reorg;
pub mod store;
pub mod transaction;

pub use block::{Block, BlockError, BlockHeader, VerificationError};
pub use chain::{BlockChain, ChainError};
pub use genesis::genesis_block;
pub use merkle::{build_tree, calculate_merkle_root, MerkleError};
pub use reorg::{calculate_chain_work, find_fork_point, ReorgEvent};
pub use store::{BlockStore, StoreError, StoredBlock};
pub use transaction::{
    OutPoint, Transaction, TransactionError, TransactionInput, TransactionOutput,
};

use crate::Network;

/// Structural limits independent of any network parameter set.
pub mod constants {
    /// Maximum block size in bytes.
    pub const MAX_BLOCK_SIZE: usize = 1_000_000;
    /// Maximum transaction size in bytes.
    pub const MAX_TRANSACTION_SIZE: usize = 100_000;
    /// Maximum number of inputs per transaction.
    pub const MAX_TRANSACTION_INPUTS: usize = 1_000;
    /// Maximum number of outputs per transaction.
    pub const MAX_TRANSACTION_OUTPUTS: usize = 1_000;
}

/// Fixed network parameter records: magic bytes, genesis block, proof-of-work
/// limit, difficulty retarget interval/timespan, address prefix, default
/// port, seed peers. Selected at construction, never loaded from a file.
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub network: Network,
    pub magic_bytes: [u8; 4],
    pub default_port: u16,
    pub address_prefix: u8,
    /// Maximum permitted proof-of-work target (the easiest allowed difficulty).
    pub pow_limit: BigUint,
    pub retarget_interval: u32,
    pub target_timespan_secs: u64,
    pub seed_peers: Vec<&'static str>,
}

impl NetworkParams {
    pub fn prod() -> Self {
        NetworkParams {
            network: Network::ProdNet,
            magic_bytes: [0xF9, 0xBE, 0xB4, 0xD9],
            default_port: 8333,
            address_prefix: 0x00,
            pow_limit: pow_limit_from_bits(0x1d00ffff),
            retarget_interval: 2016,
            target_timespan_secs: 14 * 24 * 60 * 60,
            seed_peers: vec!["seed1.svp.example.com", "seed2.svp.example.com"],
        }
    }

    pub fn test() -> Self {
        NetworkParams {
            network: Network::TestNet,
            magic_bytes: [0x0B, 0x11, 0x09, 0x07],
            default_port: 18333,
            address_prefix: 0x6f,
            pow_limit: pow_limit_from_bits(0x1d00ffff),
            retarget_interval: 2016,
            target_timespan_secs: 14 * 24 * 60 * 60,
            seed_peers: vec!["testnet-seed.svp.example.com"],
        }
    }

    pub fn unit_tests() -> Self {
        NetworkParams {
            network: Network::UnitTests,
            magic_bytes: [0xFA, 0xBF, 0xB5, 0xDA],
            default_port: 18444,
            address_prefix: 0x6f,
            pow_limit: pow_limit_from_bits(0x207fffff),
            retarget_interval: 2,
            target_timespan_secs: 120,
            seed_peers: vec![],
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::ProdNet => Self::prod(),
            Network::TestNet => Self::test(),
            Network::UnitTests => Self::unit_tests(),
        }
    }

    pub fn genesis(&self) -> Block {
        genesis::genesis_block(self)
    }
}

fn pow_limit_from_bits(bits: u32) -> BigUint {
    crate::consensus::difficulty::DifficultyTarget::from_bits(bits).to_biguint()
}

/// Error types for chain-level blockchain operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    Block(BlockError),
    Transaction(TransactionError),
    Chain(ChainError),
    Merkle(MerkleError),
    Store(StoreError),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Block(e) => write!(f, "block error: {}", e),
            BlockchainError::Transaction(e) => write!(f, "transaction error: {}", e),
            BlockchainError::Chain(e) => write!(f, "chain error: {}", e),
            BlockchainError::Merkle(e) => write!(f, "merkle error: {}", e),
            BlockchainError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<BlockError> for BlockchainError {
    fn from(err: BlockError) -> Self {
        BlockchainError::Block(err)
    }
}

impl From<TransactionError> for BlockchainError {
    fn from(err: TransactionError) -> Self {
        BlockchainError::Transaction(err)
    }
}

impl From<ChainError> for BlockchainError {
    fn from(err: ChainError) -> Self {
        BlockchainError::Chain(err)
    }
}

impl From<MerkleError> for BlockchainError {
    fn from(err: MerkleError) -> Self {
        BlockchainError::Merkle(err)
    }
}

impl From<StoreError> for BlockchainError {
    fn from(err: StoreError) -> Self {
        BlockchainError::Store(err)
    }
}

pub type BlockchainResult<T> = Result<T, BlockchainError>;
