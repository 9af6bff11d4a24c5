//! Insertion-ordered transaction pools.
//!
//! A plain `HashMap` would lose the order `CreateSend`'s greedy coin
//! selection depends on, so each pool keeps its entries in a `Vec` alongside
//! a lookup; membership checks stay O(n), which is fine at wallet scale.

use crate::{blockchain::Transaction, crypto::Hash};

#[derive(Debug, Clone, Default)]
pub struct Pool {
    entries: Vec<(Hash, Transaction)>,
}

impl Pool {
    pub fn new() -> Self {
        Pool { entries: Vec::new() }
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.entries.iter().any(|(h, _)| h == txid)
    }

    pub fn get(&self, txid: &Hash) -> Option<&Transaction> {
        self.entries.iter().find(|(h, _)| h == txid).map(|(_, t)| t)
    }

    /// Inserts `tx` under `txid` unless already present. A no-op on
    /// duplicate insert rather than an error, since `receive` may be called
    /// more than once for the same transaction across retried orphan drains.
    pub fn insert(&mut self, txid: Hash, tx: Transaction) {
        if !self.contains(&txid) {
            self.entries.push((txid, tx));
        }
    }

    pub fn remove(&mut self, txid: &Hash) -> Option<Transaction> {
        let index = self.entries.iter().position(|(h, _)| h == txid)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash, &Transaction)> {
        self.entries.iter().map(|(h, t)| (h, t))
    }

    pub fn values(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
