//! ECDSA signature creation and verification over secp256k1.
//!
//! Like `crypto::keys`, this is a thin forwarding layer: the signing
//! primitive itself is an external collaborator per the scope notes, so the
//! interesting logic here is just the wire encoding of a `Signature`, not
//! the cryptography.

use secp256k1::{ecdsa, Message, Secp256k1};
use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, PrivateKey, PublicKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(ecdsa::Signature);

impl Signature {
    pub fn to_der(&self) -> Vec<u8> {
        self.0.serialize_der().to_vec()
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, SignatureError> {
        ecdsa::Signature::from_der(bytes)
            .map(Signature)
            .map_err(|_| SignatureError::InvalidEncoding)
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        hex::encode(self.to_der()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Signature::from_der(&bytes).map_err(serde::de::Error::custom)
    }
}

pub fn sign(key: &PrivateKey, message_hash: &Hash) -> Signature {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*message_hash.as_wire_bytes());
    let secret = secp256k1::SecretKey::from_slice(&key.to_bytes())
        .expect("private key scalar validated at construction");
    Signature(secp.sign_ecdsa(&message, &secret))
}

pub fn verify(public_key: &PublicKey, message_hash: &Hash, signature: &Signature) -> bool {
    let secp = Secp256k1::new();
    let message = Message::from_digest(*message_hash.as_wire_bytes());
    let pk = match secp256k1::PublicKey::from_slice(&public_key.serialize()) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    secp.verify_ecdsa(&message, &signature.0, &pk).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid signature encoding")]
    InvalidEncoding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let key = PrivateKey::generate();
        let msg = Hash::double_sha256(b"pay alice 5");
        let sig = sign(&key, &msg);
        assert!(verify(&key.public_key(), &msg, &sig));
    }

    #[test]
    fn verify_fails_for_wrong_message() {
        let key = PrivateKey::generate();
        let msg = Hash::double_sha256(b"pay alice 5");
        let other = Hash::double_sha256(b"pay alice 50");
        let sig = sign(&key, &msg);
        assert!(!verify(&key.public_key(), &other, &sig));
    }

    #[test]
    fn verify_fails_for_wrong_key() {
        let key = PrivateKey::generate();
        let other_key = PrivateKey::generate();
        let msg = Hash::double_sha256(b"pay alice 5");
        let sig = sign(&key, &msg);
        assert!(!verify(&other_key.public_key(), &msg, &sig));
    }

    #[test]
    fn der_roundtrips() {
        let key = PrivateKey::generate();
        let msg = Hash::double_sha256(b"hello");
        let sig = sign(&key, &msg);
        let der = sig.to_der();
        let restored = Signature::from_der(&der).unwrap();
        assert_eq!(sig, restored);
    }
}
