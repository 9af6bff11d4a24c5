// SVP Core Library - Simplified Payment Verification chain-sync and wallet engine
//
// Implements the chain synchronization and wallet reconciliation core of a
// Bitcoin-wire-protocol-compatible SPV client: block validation and Merkle
// verification, a block store with reorganization logic, an asynchronous peer
// protocol state machine, and wallet state reconciliation across the
// unspent/spent/pending/dead pools.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod blockchain;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod network;
pub mod util;
pub mod wallet;
pub mod wire;

pub use blockchain::{Block, BlockHeader, Transaction};
pub use error::SvpError;

/// Which network parameter set a component was constructed with.
///
/// Named to match the source client's three deployment targets: a production
/// network, a public test network, and an in-process parameter set used only
/// by the test suite (trivial proof-of-work, a two-block retarget interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Network {
    ProdNet,
    TestNet,
    UnitTests,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::ProdNet => "prodnet",
            Network::TestNet => "testnet",
            Network::UnitTests => "unittests",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prodnet" | "mainnet" => Ok(Network::ProdNet),
            "testnet" => Ok(Network::TestNet),
            "unittests" | "regtest" => Ok(Network::UnitTests),
            other => Err(format!("unknown network '{other}'")),
        }
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: u32 = 70_015;
