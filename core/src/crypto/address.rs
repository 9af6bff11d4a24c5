//! Address generation and validation.
//!
//! Addresses are Base58Check-encoded: a one-byte network/type version prefix,
//! the 20-byte public-key (or script) hash, and a 4-byte double-SHA256
//! checksum over the two.
//!
//! # Privacy
//! Address reuse links transactions together and leaks balance information.
//! Callers should derive a fresh address per transaction where practical.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{crypto::PublicKey, Network};

const ADDRESS_SIZE: usize = 20;

/// An address derived from a public key hash or script hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    hash: [u8; ADDRESS_SIZE],
    network: Network,
    address_type: AddressType,
}

/// Types of addresses supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    /// Pay-to-Public-Key-Hash (P2PKH)
    P2PKH,
    /// Pay-to-Script-Hash (P2SH) - reserved for future use
    P2SH,
}

impl Address {
    /// Create a P2PKH address from a public key
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Address {
            hash: public_key.hash160(),
            network,
            address_type: AddressType::P2PKH,
        }
    }

    /// Create an address from a script hash (for P2SH)
    pub fn from_script_hash(script_hash: [u8; ADDRESS_SIZE], network: Network) -> Self {
        Address {
            hash: script_hash,
            network,
            address_type: AddressType::P2SH,
        }
    }

    /// Create an address from raw hash bytes and metadata
    pub fn from_hash(hash: [u8; ADDRESS_SIZE], network: Network, address_type: AddressType) -> Self {
        Address {
            hash,
            network,
            address_type,
        }
    }

    /// Parse an address from its string representation
    pub fn from_string(address_str: &str) -> Result<Self, AddressError> {
        let decoded = Self::base58_decode_check(address_str)?;

        if decoded.len() != ADDRESS_SIZE + 1 {
            return Err(AddressError::InvalidLength);
        }

        let version_byte = decoded[0];
        let mut hash = [0u8; ADDRESS_SIZE];
        hash.copy_from_slice(&decoded[1..]);

        let (network, address_type) = Self::parse_version_byte(version_byte)?;

        Ok(Address {
            hash,
            network,
            address_type,
        })
    }

    /// Get the hash160 of the address
    pub fn hash160(&self) -> &[u8; ADDRESS_SIZE] {
        &self.hash
    }

    /// Get the network this address belongs to
    pub fn network(&self) -> Network {
        self.network
    }

    /// Get the address type
    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn is_p2pkh(&self) -> bool {
        self.address_type == AddressType::P2PKH
    }

    pub fn is_p2sh(&self) -> bool {
        self.address_type == AddressType::P2SH
    }

    fn version_byte(&self) -> u8 {
        match (self.network, self.address_type) {
            (Network::ProdNet, AddressType::P2PKH) => 0x00,
            (Network::ProdNet, AddressType::P2SH) => 0x05,
            (Network::TestNet, AddressType::P2PKH) => 0x6f,
            (Network::TestNet, AddressType::P2SH) => 0xc4,
            (Network::UnitTests, AddressType::P2PKH) => 0x6f,
            (Network::UnitTests, AddressType::P2SH) => 0xc4,
        }
    }

    fn parse_version_byte(version: u8) -> Result<(Network, AddressType), AddressError> {
        match version {
            0x00 => Ok((Network::ProdNet, AddressType::P2PKH)),
            0x05 => Ok((Network::ProdNet, AddressType::P2SH)),
            0x6f => Ok((Network::TestNet, AddressType::P2PKH)),
            0xc4 => Ok((Network::TestNet, AddressType::P2SH)),
            _ => Err(AddressError::InvalidVersion),
        }
    }

    fn base58_encode_check(payload: &[u8]) -> String {
        let checksum_hash = crate::crypto::Hash::double_sha256(payload);
        let checksum = &checksum_hash.as_wire_bytes()[..4];

        let mut data = Vec::with_capacity(payload.len() + 4);
        data.extend_from_slice(payload);
        data.extend_from_slice(checksum);

        bs58::encode(data).into_string()
    }

    fn base58_decode_check(encoded: &str) -> Result<Vec<u8>, AddressError> {
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)?;

        if decoded.len() < 4 {
            return Err(AddressError::InvalidLength);
        }

        let (payload, checksum) = decoded.split_at(decoded.len() - 4);

        let expected_checksum_hash = crate::crypto::Hash::double_sha256(payload);
        let expected_checksum = &expected_checksum_hash.as_wire_bytes()[..4];

        if checksum != expected_checksum {
            return Err(AddressError::InvalidChecksum);
        }

        Ok(payload.to_vec())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version_byte = self.version_byte();
        let mut payload = Vec::with_capacity(ADDRESS_SIZE + 1);
        payload.push(version_byte);
        payload.extend_from_slice(&self.hash);
        write!(f, "{}", Self::base58_encode_check(&payload))
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

/// Error types for address operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid address length")]
    InvalidLength,
    #[error("invalid base58 encoding")]
    InvalidBase58,
    #[error("invalid address checksum")]
    InvalidChecksum,
    #[error("invalid address version")]
    InvalidVersion,
}
