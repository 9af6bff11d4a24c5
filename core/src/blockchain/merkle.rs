//! Merkle tree construction for transaction verification.
//!
//! Canonical pairwise-duplicate-odd-leaf scheme: at each level, pair
//! (i, i+1); if the level has an odd count, the last element is paired with
//! itself. The flat representation is `[leaves…, level1…, …, root]`.

use crate::{blockchain::Transaction, crypto::Hash};

/// Hash a pair of merkle tree nodes (double-SHA256 of the concatenation).
fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut combined = Vec::with_capacity(64);
    combined.extend_from_slice(left.as_wire_bytes());
    combined.extend_from_slice(right.as_wire_bytes());
    Hash::double_sha256(&combined)
}

/// Build the full flat tree `[leaves…, level1…, …, root]` from leaf hashes.
pub fn build_tree(leaves: &[Hash]) -> Result<Vec<Hash>, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyInput);
    }

    let mut flat = leaves.to_vec();
    let mut level = leaves.to_vec();

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let combined = if pair.len() == 2 {
                hash_pair(&pair[0], &pair[1])
            } else {
                hash_pair(&pair[0], &pair[0])
            };
            next.push(combined);
        }
        flat.extend_from_slice(&next);
        level = next;
    }

    Ok(flat)
}

/// Root of the merkle tree over the given leaf hashes.
pub fn merkle_root_of_hashes(leaves: &[Hash]) -> Result<Hash, MerkleError> {
    if leaves.len() == 1 {
        return Ok(leaves[0]);
    }
    let tree = build_tree(leaves)?;
    Ok(*tree.last().expect("build_tree never returns empty"))
}

/// Calculate the merkle root of a block's transaction list.
pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<Hash, MerkleError> {
    if transactions.is_empty() {
        return Err(MerkleError::EmptyInput);
    }
    let leaves: Vec<Hash> = transactions.iter().map(|tx| tx.txid()).collect();
    merkle_root_of_hashes(&leaves)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    #[error("empty transaction list")]
    EmptyInput,
}
