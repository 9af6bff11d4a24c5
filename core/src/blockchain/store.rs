//! In-memory block store: headers indexed by hash, cumulative chain work,
//! and the current chain head.

use std::collections::HashMap;

use num_bigint::BigUint;

use crate::{
    blockchain::{Block, BlockHeader, NetworkParams},
    crypto::Hash,
};

/// A stored header plus the bookkeeping the chain engine needs to compare
/// competing branches: its height and the total work of the chain ending
/// at it (not just the header's own work).
#[derive(Debug, Clone)]
pub struct StoredBlock {
    pub header: BlockHeader,
    pub height: u64,
    pub chain_work: BigUint,
}

impl StoredBlock {
    pub fn genesis(header: BlockHeader) -> Self {
        let chain_work = header.work();
        StoredBlock {
            header,
            height: 0,
            chain_work,
        }
    }

    /// Build the `StoredBlock` for a child header, given its parent.
    pub fn build(parent: &StoredBlock, header: BlockHeader) -> Self {
        let chain_work = &parent.chain_work + header.work();
        StoredBlock {
            header,
            height: parent.height + 1,
            chain_work,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

/// An in-memory index of headers by hash, tracking the current chain head.
/// Genesis is inserted and designated head at construction.
#[derive(Debug, Clone)]
pub struct BlockStore {
    blocks: HashMap<Hash, StoredBlock>,
    head: Hash,
}

impl BlockStore {
    pub fn new(params: &NetworkParams) -> Self {
        let genesis_block: Block = params.genesis();
        let genesis = StoredBlock::genesis(genesis_block.header);
        let head = genesis.hash();
        let mut blocks = HashMap::new();
        blocks.insert(head, genesis);
        BlockStore { blocks, head }
    }

    pub fn get(&self, hash: &Hash) -> Option<&StoredBlock> {
        self.blocks.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn put(&mut self, stored: StoredBlock) -> Result<(), StoreError> {
        let hash = stored.hash();
        if !self.blocks.contains_key(&stored.header.prev_hash) && stored.height != 0 {
            return Err(StoreError::MissingParent(stored.header.prev_hash));
        }
        self.blocks.insert(hash, stored);
        Ok(())
    }

    pub fn chain_head(&self) -> &StoredBlock {
        self.blocks
            .get(&self.head)
            .expect("chain head is always present in the store")
    }

    pub fn set_chain_head(&mut self, hash: Hash) -> Result<(), StoreError> {
        if !self.blocks.contains_key(&hash) {
            return Err(StoreError::UnknownBlock(hash));
        }
        self.head = hash;
        Ok(())
    }

    pub fn height(&self) -> u64 {
        self.chain_head().height
    }

    /// Walk back `count` headers from `from`, inclusive, following
    /// `prev_hash` links. Used to build block locators and to measure
    /// retarget timespans.
    pub fn ancestors(&self, from: &Hash, count: usize) -> Vec<&StoredBlock> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = *from;
        while out.len() < count {
            match self.blocks.get(&cursor) {
                Some(block) => {
                    out.push(block);
                    if block.height == 0 {
                        break;
                    }
                    cursor = block.header.prev_hash;
                }
                None => break,
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("parent block {0} is not in the store")]
    MissingParent(Hash),
    #[error("block {0} is not in the store")]
    UnknownBlock(Hash),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_of(parent: &StoredBlock, nonce: u32) -> StoredBlock {
        let header = BlockHeader::new(
            1,
            parent.hash(),
            Hash::double_sha256(b"merkle"),
            parent.header.time + 600,
            parent.header.bits,
            nonce,
        );
        StoredBlock::build(parent, header)
    }

    #[test]
    fn new_store_has_genesis_as_head() {
        let params = NetworkParams::unit_tests();
        let store = BlockStore::new(&params);
        assert_eq!(store.chain_head().height, 0);
        assert_eq!(store.chain_head().hash(), params.genesis().hash());
    }

    #[test]
    fn put_rejects_block_with_unknown_parent() {
        let params = NetworkParams::unit_tests();
        let mut store = BlockStore::new(&params);
        let orphan_parent = StoredBlock::genesis(BlockHeader::new(
            1,
            Hash::double_sha256(b"nonexistent"),
            Hash::zero(),
            0,
            0x207fffff,
            0,
        ));
        let orphan = StoredBlock::build(&orphan_parent, BlockHeader::new(1, orphan_parent.hash(), Hash::zero(), 0, 0x207fffff, 0));
        assert!(matches!(store.put(orphan), Err(StoreError::MissingParent(_))));
    }

    #[test]
    fn ancestors_walks_back_to_genesis() {
        let params = NetworkParams::unit_tests();
        let mut store = BlockStore::new(&params);
        let genesis = store.chain_head().clone();
        let child = child_of(&genesis, 1);
        let child_hash = child.hash();
        store.put(child).unwrap();
        store.set_chain_head(child_hash).unwrap();

        let ancestors = store.ancestors(&child_hash, 10);
        assert_eq!(ancestors.len(), 2);
        assert_eq!(ancestors[0].hash(), child_hash);
        assert_eq!(ancestors[1].height, 0);
    }

    #[test]
    fn set_chain_head_rejects_unknown_block() {
        let params = NetworkParams::unit_tests();
        let mut store = BlockStore::new(&params);
        let unknown = Hash::double_sha256(b"unknown");
        assert_eq!(
            store.set_chain_head(unknown).unwrap_err(),
            StoreError::UnknownBlock(unknown)
        );
    }
}
