//! The set of private keys a wallet holds, and the `IsMine`/`IsPubKeyMine`
//! recognition rules built on top of it.

use crate::{
    blockchain::TransactionOutput,
    crypto::{PrivateKey, PublicKey, ScriptOp},
};

#[derive(Default)]
pub struct KeyRing {
    keys: Vec<PrivateKey>,
}

impl KeyRing {
    pub fn new() -> Self {
        KeyRing { keys: Vec::new() }
    }

    pub fn add_key(&mut self, key: PrivateKey) {
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[PrivateKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True iff `output`'s locking script pays a pubkey hash held in this
    /// ring. Only recognizes the P2PKH shape (`OP_DUP OP_HASH160 <hash>
    /// OP_EQUALVERIFY OP_CHECKSIG`); anything else is not ours.
    pub fn is_mine(&self, output: &TransactionOutput) -> bool {
        self.key_for_output(output).is_some()
    }

    pub fn is_pubkey_mine(&self, pubkey: &PublicKey) -> bool {
        self.keys.iter().any(|k| &k.public_key() == pubkey)
    }

    /// The key that can spend `output`, if this ring holds it.
    pub fn key_for_output(&self, output: &TransactionOutput) -> Option<&PrivateKey> {
        output.script_pubkey.operations().iter().find_map(|op| {
            let ScriptOp::PushData(data) = op else {
                return None;
            };
            if data.len() != 20 {
                return None;
            }
            let mut hash160 = [0u8; 20];
            hash160.copy_from_slice(data);
            self.keys.iter().find(|k| k.public_key().hash160() == hash160)
        })
    }

    /// Hash160 to send change to when the caller doesn't specify one: the
    /// first key in the ring.
    pub fn default_change_hash160(&self) -> Option<[u8; 20]> {
        self.keys.first().map(|k| k.public_key().hash160())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Script;

    #[test]
    fn recognizes_own_p2pkh_output() {
        let mut ring = KeyRing::new();
        let key = PrivateKey::generate();
        let hash160 = key.public_key().hash160();
        ring.add_key(key);

        let output = TransactionOutput {
            value: 1,
            script_pubkey: Script::pay_to_pubkey_hash(hash160),
        };
        assert!(ring.is_mine(&output));
    }

    #[test]
    fn does_not_recognize_someone_elses_output() {
        let mut ring = KeyRing::new();
        ring.add_key(PrivateKey::generate());
        let other_hash160 = PrivateKey::generate().public_key().hash160();

        let output = TransactionOutput {
            value: 1,
            script_pubkey: Script::pay_to_pubkey_hash(other_hash160),
        };
        assert!(!ring.is_mine(&output));
    }

    #[test]
    fn is_pubkey_mine_matches_held_keys_only() {
        let mut ring = KeyRing::new();
        let held = PrivateKey::generate();
        let not_held = PrivateKey::generate();
        ring.add_key(held.clone());

        assert!(ring.is_pubkey_mine(&held.public_key()));
        assert!(!ring.is_pubkey_mine(&not_held.public_key()));
    }
}
