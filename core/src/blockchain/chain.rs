//! Chain engine: connects verified blocks onto the store, detects forks,
//! and reorganizes onto whichever branch carries the most work.

use std::collections::HashMap;

use crate::{
    blockchain::{
        block::VerificationError,
        reorg::{build_reorg_event, find_fork_point, ReorgEvent},
        store::{BlockStore, StoreError, StoredBlock},
        Block, NetworkParams,
    },
    consensus::difficulty,
    crypto::Hash,
};

/// Outcome of `BlockChain::add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// The block was already known; nothing changed.
    Duplicate,
    /// The block's parent is not yet known; it is held until that ancestor
    /// arrives.
    Orphan,
    /// The block extended the current best chain without a reorg.
    Connected(Hash),
    /// The block attached to a side branch that does not (yet) outweigh the
    /// current best chain.
    SideChain(Hash),
    /// The block made a competing branch the new best chain.
    Reorganized(ReorgEvent),
}

/// Header chain with orphan handling and reorganization onto the
/// most-work branch. Does not retain full blocks (transactions are handed
/// to interested callers as each block is added; only headers persist).
pub struct BlockChain {
    params: NetworkParams,
    store: BlockStore,
    /// Blocks buffered because their parent has not arrived yet, keyed by
    /// parent hash.
    orphans: HashMap<Hash, Vec<Block>>,
}

impl BlockChain {
    pub fn new(params: NetworkParams) -> Self {
        let store = BlockStore::new(&params);
        BlockChain {
            params,
            store,
            orphans: HashMap::new(),
        }
    }

    pub fn tip(&self) -> &StoredBlock {
        self.store.chain_head()
    }

    pub fn height(&self) -> u64 {
        self.store.height()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.store.contains(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&StoredBlock> {
        self.store.get(hash)
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Add a block. Verifies it context-free, then against its parent
    /// (connection, difficulty transition), then reorganizes onto it if it
    /// now carries more cumulative work than the current tip. Returns
    /// immediately for a block already known (idempotent).
    pub fn add(&mut self, block: Block, now_secs: u64) -> Result<ChainEvent, ChainError> {
        let hash = block.hash();
        if self.store.contains(&hash) {
            return Ok(ChainEvent::Duplicate);
        }

        block.verify(&self.params.pow_limit, now_secs)?;

        let Some(parent) = self.store.get(&block.header.prev_hash).cloned() else {
            self.orphans
                .entry(block.header.prev_hash)
                .or_default()
                .push(block);
            return Ok(ChainEvent::Orphan);
        };

        let event = self.connect(&parent, block)?;
        self.drain_orphans(hash, event)
    }

    /// Verify the difficulty transition (if this height is a retarget
    /// boundary), append to the store, and reorganize if it wins.
    fn connect(&mut self, parent: &StoredBlock, block: Block) -> Result<ChainEvent, ChainError> {
        let expected_bits = self.expected_bits(parent)?;
        if block.header.bits != expected_bits {
            return Err(ChainError::Block(VerificationError::BadDifficultyTransition));
        }

        let stored = StoredBlock::build(parent, block.header);
        let hash = stored.hash();
        let stored_work = stored.chain_work.clone();
        self.store.put(stored)?;

        let current_tip = self.store.chain_head().hash();
        let current_work = self.store.chain_head().chain_work.clone();

        if hash == current_tip {
            // First block ever connected on top of genesis.
            return Ok(ChainEvent::Connected(hash));
        }

        if stored_work <= current_work {
            // Known but not the best chain; kept in the store for future
            // reorg comparisons without moving the head.
            return Ok(ChainEvent::SideChain(hash));
        }

        let fork_point = find_fork_point(&self.store, &current_tip, &hash)
            .ok_or(ChainError::MissingAncestor)?;
        self.store.set_chain_head(hash)?;

        if fork_point == current_tip {
            Ok(ChainEvent::Connected(hash))
        } else {
            let event = build_reorg_event(&self.store, &current_tip, &hash, fork_point);
            Ok(ChainEvent::Reorganized(event))
        }
    }

    /// After connecting `parent_hash`, try connecting anything that was
    /// buffered waiting for it, repeating as each connection may unblock
    /// further orphans.
    fn drain_orphans(
        &mut self,
        parent_hash: Hash,
        mut last_event: ChainEvent,
    ) -> Result<ChainEvent, ChainError> {
        let mut frontier = vec![parent_hash];
        while let Some(hash) = frontier.pop() {
            let Some(waiting) = self.orphans.remove(&hash) else {
                continue;
            };
            for block in waiting {
                let Some(parent) = self.store.get(&block.header.prev_hash).cloned() else {
                    continue;
                };
                let child_hash = block.hash();
                last_event = self.connect(&parent, block)?;
                frontier.push(child_hash);
            }
        }
        Ok(last_event)
    }

    /// The bits a child of `parent` must declare: unchanged except at a
    /// retarget boundary, where it is recomputed from the timespan between
    /// the boundary's first and last block.
    fn expected_bits(&self, parent: &StoredBlock) -> Result<u32, ChainError> {
        let child_height = parent.height + 1;
        if child_height % self.params.retarget_interval as u64 != 0 {
            return Ok(parent.header.bits);
        }

        let window = self.params.retarget_interval as usize;
        let ancestors = self.store.ancestors(&parent.hash(), window);
        let boundary_start = ancestors
            .last()
            .ok_or(ChainError::InsufficientHistory)?;

        let actual_timespan = parent
            .header
            .time
            .saturating_sub(boundary_start.header.time) as u64;

        Ok(difficulty::retarget(
            parent.header.bits,
            actual_timespan,
            self.params.target_timespan_secs,
            &self.params.pow_limit,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("block verification failed: {0}")]
    Block(#[from] VerificationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("fork point is not in the store")]
    MissingAncestor,
    #[error("not enough history to compute a difficulty retarget")]
    InsufficientHistory,
}
