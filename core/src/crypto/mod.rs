//! Cryptographic primitives: double-SHA256 hashing and secp256k1 ECDSA keys,
//! signatures, addresses, and the transaction script system built on top of
//! them.

use std::fmt;

pub mod address;
pub mod hash;
pub mod keys;
pub mod script;
pub mod signatures;

pub use address::{Address, AddressError};
pub use hash::{Hash, HashError};
pub use keys::{KeyError, PrivateKey, PublicKey};
pub use script::{Script, ScriptError, ScriptOp};
pub use signatures::{Signature, SignatureError};

/// Error types for cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    Hash(HashError),
    Key(KeyError),
    Signature(SignatureError),
    Address(AddressError),
    Script(ScriptError),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::Hash(e) => write!(f, "hash error: {}", e),
            CryptoError::Key(e) => write!(f, "key error: {}", e),
            CryptoError::Signature(e) => write!(f, "signature error: {}", e),
            CryptoError::Address(e) => write!(f, "address error: {}", e),
            CryptoError::Script(e) => write!(f, "script error: {}", e),
        }
    }
}

impl std::error::Error for CryptoError {}

impl From<HashError> for CryptoError {
    fn from(err: HashError) -> Self {
        CryptoError::Hash(err)
    }
}

impl From<KeyError> for CryptoError {
    fn from(err: KeyError) -> Self {
        CryptoError::Key(err)
    }
}

impl From<SignatureError> for CryptoError {
    fn from(err: SignatureError) -> Self {
        CryptoError::Signature(err)
    }
}

impl From<AddressError> for CryptoError {
    fn from(err: AddressError) -> Self {
        CryptoError::Address(err)
    }
}

impl From<ScriptError> for CryptoError {
    fn from(err: ScriptError) -> Self {
        CryptoError::Script(err)
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_conversions() {
        let hash_error = HashError::InvalidLength;
        let crypto_error: CryptoError = hash_error.into();

        match crypto_error {
            CryptoError::Hash(HashError::InvalidLength) => (),
            _ => panic!("error conversion failed"),
        }
    }
}
