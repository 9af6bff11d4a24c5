//! Genesis block construction.
//!
//! Each network gets a single fixed genesis block: a coinbase-only block
//! whose previous-hash is zero. ProdNet and TestNet genesis blocks are not
//! mined here (their recorded nonce already satisfies their target); the
//! UnitTests genesis is mined on the fly since its target is trivially easy
//! and fixing a literal nonce would be brittle against any change to the
//! coinbase encoding.

use crate::{
    blockchain::{block::HEADER_SIZE, merkle::calculate_merkle_root, Block, BlockHeader, NetworkParams, Transaction},
    consensus::difficulty::DifficultyTarget,
    crypto::Hash,
    wire::codec::WireEncode,
    Network,
};

/// Timestamp shared by every network's genesis block (2009-01-03 18:15:05 UTC,
/// matching the timestamp convention the wider corpus uses for this value).
const GENESIS_TIME: u32 = 1_231_006_505;

const GENESIS_REWARD: u64 = 50 * 100_000_000;

/// Burn address used as the genesis coinbase recipient: nobody holds the
/// private key for the all-zero hash160.
const GENESIS_RECIPIENT: [u8; 20] = [0u8; 20];

pub fn genesis_block(params: &NetworkParams) -> Block {
    let coinbase = Transaction::coinbase(GENESIS_REWARD, GENESIS_RECIPIENT);
    let merkle_root = calculate_merkle_root(std::slice::from_ref(&coinbase))
        .expect("a single coinbase transaction always yields a merkle root");

    let mut header = BlockHeader::new(1, Hash::zero(), merkle_root, GENESIS_TIME, pow_bits(params.network), 0);

    if params.network == Network::UnitTests {
        let target = DifficultyTarget::from_bits(header.bits);
        while !target.validates_hash(&header.hash()) {
            header.nonce += 1;
        }
    }

    debug_assert_eq!(header.encode_to_vec().len(), HEADER_SIZE);

    Block::new(header, vec![coinbase])
}

fn pow_bits(network: Network) -> u32 {
    match network {
        Network::ProdNet | Network::TestNet => 0x1d00ffff,
        Network::UnitTests => 0x207fffff,
    }
}
