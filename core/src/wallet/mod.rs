//! Wallet state reconciliation: a key ring, the four transaction pools
//! (unspent/spent/pending/dead), and the `Receive`/`Reorganize` rules that
//! keep them consistent as the chain advances, forks, and reorganizes.
//!
//! The wallet never talks to the network or the chain engine directly; a
//! caller (the node binary) feeds it confirmed and side-chain blocks as they
//! arrive and tells it about reorganizations, per the ordering guarantees of
//! the surrounding system (`BlockChain` lock held across the whole add,
//! nested inside it the Wallet lock).

pub mod keyring;
pub mod pool;
pub mod persist;

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    blockchain::{Block, OutPoint, Transaction, TransactionInput, TransactionOutput},
    crypto::{Hash, PrivateKey, PublicKey, Script},
    wallet::{keyring::KeyRing, pool::Pool},
    wire::{WireEncode, WireError},
};

/// Whether a block handed to `Wallet::receive` is on the currently-best
/// chain or a side branch being tracked in case it later wins a reorg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    BestChain,
    SideChain,
}

/// Raised when an incoming confirmed transaction spends the same output as
/// a transaction we were still waiting to confirm: the pending one is
/// presumed double-spent and moved to `dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadTransactionEvent {
    pub dead: Hash,
    pub replacement: Hash,
}

pub struct Wallet {
    keyring: KeyRing,
    unspent: Pool,
    spent: Pool,
    pending: Pool,
    dead: Pool,
    /// Transactions seen in blocks on a side branch, keyed by that block's
    /// hash, retained so a later reorg that promotes the branch can replay
    /// them through the ordinary `receive` path.
    side_chain: std::collections::HashMap<Hash, Vec<Transaction>>,
}

impl Wallet {
    pub fn new() -> Self {
        Wallet {
            keyring: KeyRing::new(),
            unspent: Pool::new(),
            spent: Pool::new(),
            pending: Pool::new(),
            dead: Pool::new(),
            side_chain: std::collections::HashMap::new(),
        }
    }

    pub fn add_key(&mut self, key: PrivateKey) {
        self.keyring.add_key(key);
    }

    pub fn is_mine(&self, output: &TransactionOutput) -> bool {
        self.keyring.is_mine(output)
    }

    pub fn is_pubkey_mine(&self, pubkey: &PublicKey) -> bool {
        self.keyring.is_pubkey_mine(pubkey)
    }

    pub fn keys(&self) -> &[PrivateKey] {
        self.keyring.keys()
    }

    pub fn unspent(&self) -> &Pool {
        &self.unspent
    }

    pub fn spent(&self) -> &Pool {
        &self.spent
    }

    pub fn pending(&self) -> &Pool {
        &self.pending
    }

    pub fn dead(&self) -> &Pool {
        &self.dead
    }

    /// Spendable right now: our outputs in `unspent` transactions, minus any
    /// already committed as an input of a `pending` send.
    pub fn available_balance(&self) -> u64 {
        let committed = self.pending_spent_outpoints();
        self.our_unspent_outputs()
            .filter(|(outpoint, _)| !committed.contains(outpoint))
            .map(|(_, output)| output.value)
            .sum()
    }

    /// Available, plus our own outputs created by transactions we've sent
    /// but that haven't confirmed yet (pending's own change/self-payments).
    pub fn estimated_balance(&self) -> u64 {
        let pending_payback: u64 = self
            .pending
            .values()
            .flat_map(|tx| tx.outputs.iter())
            .filter(|output| self.is_mine(output))
            .map(|output| output.value)
            .sum();
        self.available_balance() + pending_payback
    }

    fn our_unspent_outputs(&self) -> impl Iterator<Item = (OutPoint, &TransactionOutput)> {
        self.unspent.iter().flat_map(|(txid, tx)| {
            tx.outputs
                .iter()
                .enumerate()
                .map(move |(vout, output)| (OutPoint::new(*txid, vout as u32), output))
                .filter(|(_, output)| self.is_mine(output))
        })
    }

    fn pending_spent_outpoints(&self) -> HashSet<OutPoint> {
        self.pending
            .values()
            .flat_map(|tx| tx.inputs.iter().map(|input| input.previous_output))
            .collect()
    }

    /// True iff `tx` pays at least one of our keys or spends an output we
    /// recognize as signed by one of our keys.
    fn is_relevant(&self, tx: &Transaction) -> bool {
        tx.outputs.iter().any(|output| self.is_mine(output))
            || tx.inputs.iter().any(|input| self.input_is_ours(input))
    }

    fn input_is_ours(&self, input: &TransactionInput) -> bool {
        input.script_sig.operations().iter().any(|op| {
            let crate::crypto::ScriptOp::PushData(data) = op else {
                return false;
            };
            data.len() == 33
                && PublicKey::from_bytes(data)
                    .map(|pk| self.is_pubkey_mine(&pk))
                    .unwrap_or(false)
        })
    }

    /// Receive a transaction known to be relevant to us, confirmed in
    /// `block_type`'s branch. Returns any pending transactions this receipt
    /// marks `dead` via double-spend detection.
    pub fn receive(
        &mut self,
        tx: Transaction,
        block_hash: Hash,
        block_type: BlockType,
    ) -> Vec<DeadTransactionEvent> {
        if !self.is_relevant(&tx) {
            return Vec::new();
        }

        if block_type == BlockType::SideChain {
            self.side_chain.entry(block_hash).or_default().push(tx);
            return Vec::new();
        }

        let txid = tx.txid();
        let mut events = Vec::new();

        let conflicting: Vec<Hash> = self
            .pending
            .iter()
            .filter(|(pending_txid, pending_tx)| {
                **pending_txid != txid && shares_an_input(pending_tx, &tx)
            })
            .map(|(hash, _)| *hash)
            .collect();
        for pending_txid in conflicting {
            if let Some(dead_tx) = self.pending.remove(&pending_txid) {
                self.dead.insert(pending_txid, dead_tx);
                events.push(DeadTransactionEvent {
                    dead: pending_txid,
                    replacement: txid,
                });
            }
        }

        self.pending.remove(&txid);
        self.classify_confirmed(tx);
        events
    }

    fn classify_confirmed(&mut self, tx: Transaction) {
        let txid = tx.txid();

        for input in &tx.inputs {
            let predecessor = input.previous_output.txid;
            if let Some(predecessor_tx) = self.unspent.remove(&predecessor) {
                self.spent.insert(predecessor, predecessor_tx);
            }
        }

        if tx.outputs.iter().any(|output| self.is_mine(output)) {
            self.unspent.insert(txid, tx);
        }
    }

    /// Rewind `old_chain` (ordered from the old tip down to just above the
    /// fork point) and replay `new_chain` (ordered from the fork point up to
    /// the new tip) through `receive`. Transactions of ours that appear only
    /// in `old_chain` return to `pending`; everything else is reclassified
    /// exactly as if it had just arrived on the best chain.
    pub fn reorganize(&mut self, old_chain: &[Block], new_chain: &[Block]) -> Vec<DeadTransactionEvent> {
        for block in old_chain {
            for tx in &block.transactions {
                let txid = tx.txid();
                if let Some(t) = self.unspent.remove(&txid) {
                    self.pending.insert(txid, t);
                } else if let Some(t) = self.spent.remove(&txid) {
                    if tx.outputs.iter().any(|output| self.is_mine(output)) {
                        self.pending.insert(txid, t);
                    }
                }
            }
        }

        let mut events = Vec::new();
        for block in new_chain {
            let block_hash = block.hash();
            let transactions = self
                .side_chain
                .remove(&block_hash)
                .unwrap_or_else(|| block.transactions.clone());
            for tx in transactions {
                events.extend(self.receive(tx, block_hash, BlockType::BestChain));
            }
        }
        events
    }

    /// Greedily select unspent, uncommitted coins (in pool insertion order)
    /// to cover `amount`, build a transaction paying `to_hash160` with a
    /// change output if anything remains, and sign every input. The result
    /// is not placed in any pool; call `confirm_send` once it is broadcast.
    pub fn create_send(
        &self,
        to_hash160: [u8; 20],
        amount: u64,
        change_hash160: Option<[u8; 20]>,
    ) -> Result<Transaction, WalletError> {
        let committed = self.pending_spent_outpoints();

        let mut inputs = Vec::new();
        let mut signing_keys = Vec::new();
        let mut total = 0u64;

        'selection: for (txid, tx) in self.unspent.iter() {
            for (vout, output) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint::new(*txid, vout as u32);
                if committed.contains(&outpoint) {
                    continue;
                }
                let Some(key) = self.keyring.key_for_output(output) else {
                    continue;
                };
                inputs.push(TransactionInput {
                    previous_output: outpoint,
                    script_sig: Script::new(),
                    sequence: 0xffffffff,
                });
                signing_keys.push(key.clone());
                total += output.value;
                if total >= amount {
                    break 'selection;
                }
            }
        }

        if total < amount {
            return Err(WalletError::InsufficientFunds {
                needed: amount,
                available: total,
            });
        }

        let mut outputs = vec![TransactionOutput {
            value: amount,
            script_pubkey: Script::pay_to_pubkey_hash(to_hash160),
        }];

        let change = total - amount;
        if change > 0 {
            let change_hash160 = match change_hash160 {
                Some(hash160) => hash160,
                None => self
                    .keyring
                    .default_change_hash160()
                    .ok_or(WalletError::NoKeys)?,
            };
            outputs.push(TransactionOutput {
                value: change,
                script_pubkey: Script::pay_to_pubkey_hash(change_hash160),
            });
        }

        let mut tx = Transaction {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        };

        let sighash = Hash::double_sha256(&tx.encode_to_vec());
        for (input, key) in tx.inputs.iter_mut().zip(signing_keys.iter()) {
            let signature = key.sign(&sighash);
            input.script_sig = Script::unlock_p2pkh(&signature, &key.public_key());
        }

        Ok(tx)
    }

    /// Record a transaction built by `create_send` (and broadcast by the
    /// caller) as pending, so its inputs are excluded from future selection
    /// and its own change is counted toward the estimated balance.
    pub fn confirm_send(&mut self, tx: Transaction) {
        self.pending.insert(tx.txid(), tx);
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

fn shares_an_input(a: &Transaction, b: &Transaction) -> bool {
    a.inputs
        .iter()
        .any(|a_in| b.inputs.iter().any(|b_in| a_in.previous_output == b_in.previous_output))
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("wallet has no keys to receive change")]
    NoKeys,
    #[error("malformed wallet file: {0}")]
    BadFormat(String),
    #[error(transparent)]
    Wire(#[from] WireError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockHeader, Transaction as Tx};

    fn coinbase_to(key: &PrivateKey, value: u64) -> Tx {
        Tx::coinbase(value, key.public_key().hash160())
    }

    fn block_with(txs: Vec<Tx>) -> Block {
        Block::new(BlockHeader::new(1, Hash::zero(), Hash::zero(), 0, 0x207fffff, 0), txs)
    }

    #[test]
    fn receiving_a_payment_adds_it_to_unspent() {
        let mut wallet = Wallet::new();
        let key = PrivateKey::generate();
        wallet.add_key(key.clone());

        let tx = coinbase_to(&key, 5_000_000_000);
        let events = wallet.receive(tx.clone(), Hash::double_sha256(b"block"), BlockType::BestChain);

        assert!(events.is_empty());
        assert_eq!(wallet.unspent().len(), 1);
        assert_eq!(wallet.available_balance(), 5_000_000_000);
        assert_eq!(wallet.estimated_balance(), 5_000_000_000);
    }

    #[test]
    fn irrelevant_transaction_is_ignored() {
        let mut wallet = Wallet::new();
        wallet.add_key(PrivateKey::generate());

        let stranger = PrivateKey::generate();
        let tx = coinbase_to(&stranger, 1_000_000);
        wallet.receive(tx, Hash::double_sha256(b"block"), BlockType::BestChain);

        assert_eq!(wallet.unspent().len(), 0);
        assert_eq!(wallet.available_balance(), 0);
    }

    #[test]
    fn side_chain_transaction_does_not_affect_balance() {
        let mut wallet = Wallet::new();
        let key = PrivateKey::generate();
        wallet.add_key(key.clone());

        let tx = coinbase_to(&key, 5_000_000_000);
        let block_hash = Hash::double_sha256(b"side block");
        wallet.receive(tx, block_hash, BlockType::SideChain);

        assert_eq!(wallet.available_balance(), 0);
        assert_eq!(wallet.unspent().len(), 0);
    }

    #[test]
    fn create_send_spends_unspent_coins_and_signs_inputs() {
        let mut wallet = Wallet::new();
        let key = PrivateKey::generate();
        wallet.add_key(key.clone());

        let funding = coinbase_to(&key, 10_000_000_000);
        wallet.receive(funding, Hash::double_sha256(b"block"), BlockType::BestChain);

        let recipient = PrivateKey::generate().public_key().hash160();
        let tx = wallet.create_send(recipient, 3_000_000_000, None).unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 3_000_000_000);
        assert_eq!(tx.outputs[1].value, 7_000_000_000);
        assert!(!tx.inputs[0].script_sig.operations().is_empty());
    }

    #[test]
    fn create_send_fails_when_funds_are_insufficient() {
        let wallet = Wallet::new();
        let recipient = PrivateKey::generate().public_key().hash160();
        let err = wallet.create_send(recipient, 1, None).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { needed: 1, available: 0 }));
    }

    #[test]
    fn pending_send_reduces_available_but_not_estimated() {
        let mut wallet = Wallet::new();
        let key = PrivateKey::generate();
        wallet.add_key(key.clone());

        let funding = coinbase_to(&key, 10_000_000_000);
        wallet.receive(funding, Hash::double_sha256(b"block"), BlockType::BestChain);

        let recipient = PrivateKey::generate().public_key().hash160();
        let send = wallet.create_send(recipient, 3_000_000_000, Some(key.public_key().hash160())).unwrap();
        wallet.confirm_send(send);

        assert_eq!(wallet.available_balance(), 0);
        assert_eq!(wallet.estimated_balance(), 10_000_000_000);
    }

    #[test]
    fn a_double_spend_of_a_pending_send_marks_it_dead() {
        let mut wallet = Wallet::new();
        let key = PrivateKey::generate();
        wallet.add_key(key.clone());

        let funding = coinbase_to(&key, 10_000_000_000);
        let funding_txid = funding.txid();
        wallet.receive(funding, Hash::double_sha256(b"block"), BlockType::BestChain);

        let recipient = PrivateKey::generate().public_key().hash160();
        let pending_send = wallet.create_send(recipient, 3_000_000_000, None).unwrap();
        let pending_txid = pending_send.txid();
        wallet.confirm_send(pending_send);
        assert_eq!(wallet.pending().len(), 1);

        // A conflicting transaction confirms first, spending the same coin.
        let attacker_recipient = PrivateKey::generate().public_key().hash160();
        let double_spend = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                previous_output: OutPoint::new(funding_txid, 0),
                script_sig: Script::new(),
                sequence: 0xffffffff,
            }],
            outputs: vec![TransactionOutput {
                value: 9_000_000_000,
                script_pubkey: Script::pay_to_pubkey_hash(attacker_recipient),
            }],
            lock_time: 0,
        };
        // Not directly relevant (pays nobody we hold), but its input is
        // signed with our key via the unlock script, making it relevant.
        let mut double_spend = double_spend;
        let sighash = Hash::double_sha256(&double_spend.encode_to_vec());
        let signature = key.sign(&sighash);
        double_spend.inputs[0].script_sig = Script::unlock_p2pkh(&signature, &key.public_key());
        let double_spend_txid = double_spend.txid();

        let events = wallet.receive(double_spend, Hash::double_sha256(b"block2"), BlockType::BestChain);

        assert_eq!(events, vec![DeadTransactionEvent { dead: pending_txid, replacement: double_spend_txid }]);
        assert_eq!(wallet.dead().len(), 1);
        assert_eq!(wallet.pending().len(), 0);
    }

    #[test]
    fn reorganize_replays_side_chain_transactions_once_promoted() {
        let mut wallet = Wallet::new();
        let key = PrivateKey::generate();
        wallet.add_key(key.clone());

        let old_tip_tx = coinbase_to(&PrivateKey::generate(), 1);
        let old_block = block_with(vec![old_tip_tx]);

        let side_tx = coinbase_to(&key, 2_000_000_000);
        let side_block_hash = Hash::double_sha256(b"side");
        wallet.receive(side_tx.clone(), side_block_hash, BlockType::SideChain);

        let mut new_header = BlockHeader::new(1, Hash::zero(), Hash::zero(), 0, 0x207fffff, 0);
        // Force the promoted block's hash to match the side-chain index key
        // by constructing it identically to how it was first seen.
        new_header.nonce = 0;
        let new_block = Block::new(new_header, vec![]);
        let promoted_hash = new_block.hash();
        wallet.side_chain.insert(promoted_hash, vec![side_tx]);

        wallet.reorganize(&[old_block], &[new_block]);

        assert_eq!(wallet.available_balance(), 2_000_000_000);
    }
}
