//! Key pair generation and management.
//!
//! Signing and key generation are treated as an external collaborator with a
//! stated interface rather than a subsystem this crate owns: everything here
//! is a thin, directly-forwarding wrapper over `secp256k1`. The wallet never
//! reaches into `secp256k1` types directly so that collaborator could be
//! swapped without touching `wallet`.

use rand::rngs::OsRng;
use secp256k1::{PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::Hash;

/// A private key with secure memory handling: the raw scalar is zeroized on
/// drop. `secp256k1::SecretKey` does not implement `Zeroize`, so the scalar
/// is kept as bytes and the `SecretKey` is reconstructed on demand for
/// signing.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    scalar: [u8; 32],
}

impl PrivateKey {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, _) = secp.generate_keypair(&mut OsRng);
        PrivateKey {
            scalar: secret.secret_bytes(),
        }
    }

    pub fn from_bytes(scalar: [u8; 32]) -> Result<Self, KeyError> {
        SecretKey::from_slice(&scalar).map_err(|_| KeyError::InvalidScalar)?;
        Ok(PrivateKey { scalar })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.scalar
    }

    fn secret_key(&self) -> SecretKey {
        SecretKey::from_slice(&self.scalar).expect("scalar validated at construction")
    }

    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey(Secp256k1PublicKey::from_secret_key(&secp, &self.secret_key()))
    }

    pub fn sign(&self, message_hash: &Hash) -> crate::crypto::Signature {
        crate::crypto::signatures::sign(self, message_hash)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey(..)")
    }
}

impl Serialize for PrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        hex::encode(self.scalar).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("private key must be 32 bytes"));
        }
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&bytes);
        PrivateKey::from_bytes(scalar).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(Secp256k1PublicKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.serialize().hash(state);
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Secp256k1PublicKey::from_slice(bytes)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    pub fn serialize(&self) -> [u8; 33] {
        self.0.serialize()
    }

    /// RIPEMD-160(SHA-256(pubkey)), the standard pay-to-pubkey-hash digest.
    pub fn hash160(&self) -> [u8; 20] {
        use ripemd::Ripemd160;
        use sha2::{Digest, Sha256};

        let sha = Sha256::digest(self.serialize());
        let mut out = [0u8; 20];
        out.copy_from_slice(&Ripemd160::digest(sha));
        out
    }

    pub fn verify(&self, message_hash: &Hash, signature: &crate::crypto::Signature) -> bool {
        crate::crypto::signatures::verify(self, message_hash, signature)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        hex::encode(self.0.serialize()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid private key scalar")]
    InvalidScalar,
    #[error("invalid public key encoding")]
    InvalidPublicKey,
}
