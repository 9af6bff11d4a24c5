//! Chain reorganization: common-ancestor search and cumulative-work
//! comparison between competing branches.

use num_bigint::BigUint;

use crate::{
    blockchain::store::{BlockStore, StoredBlock},
    crypto::Hash,
};

/// A completed reorganization: the branches disconnect back to `fork_point`
/// (exclusive), then connect forward along `connected` (exclusive of the
/// fork point, ending at the new tip).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgEvent {
    pub fork_point: Hash,
    pub disconnected: Vec<Hash>,
    pub connected: Vec<Hash>,
}

/// Total work of the chain ending at `hash`, or `None` if it is not in the
/// store.
pub fn calculate_chain_work(store: &BlockStore, hash: &Hash) -> Option<BigUint> {
    store.get(hash).map(|b| b.chain_work.clone())
}

/// The most recent block both `a` and `b` descend from. Walks the taller
/// chain up to the shorter chain's height, then both in lockstep.
pub fn find_fork_point(store: &BlockStore, a: &Hash, b: &Hash) -> Option<Hash> {
    let mut a_block = store.get(a)?;
    let mut b_block = store.get(b)?;

    let mut a_hash = *a;
    let mut b_hash = *b;

    while a_block.height > b_block.height {
        a_hash = a_block.header.prev_hash;
        a_block = store.get(&a_hash)?;
    }
    while b_block.height > a_block.height {
        b_hash = b_block.header.prev_hash;
        b_block = store.get(&b_hash)?;
    }

    while a_hash != b_hash {
        a_hash = a_block.header.prev_hash;
        b_hash = b_block.header.prev_hash;
        a_block = store.get(&a_hash)?;
        b_block = store.get(&b_hash)?;
    }

    Some(a_hash)
}

/// Build the disconnect/connect lists for switching the chain head from
/// `old_tip` to `new_tip`, given their common ancestor.
pub fn build_reorg_event(
    store: &BlockStore,
    old_tip: &Hash,
    new_tip: &Hash,
    fork_point: Hash,
) -> ReorgEvent {
    let mut disconnected = Vec::new();
    let mut cursor = *old_tip;
    while cursor != fork_point {
        disconnected.push(cursor);
        cursor = store
            .get(&cursor)
            .expect("disconnect path must stay within the store")
            .header
            .prev_hash;
    }

    let mut connected = Vec::new();
    cursor = *new_tip;
    while cursor != fork_point {
        connected.push(cursor);
        cursor = store
            .get(&cursor)
            .expect("connect path must stay within the store")
            .header
            .prev_hash;
    }
    connected.reverse();

    ReorgEvent {
        fork_point,
        disconnected,
        connected,
    }
}
