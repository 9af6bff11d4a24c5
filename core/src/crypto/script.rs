//! Script system for transaction input/output validation.
//!
//! A simplified, non-Turing-complete script system covering pay-to-pubkey-hash
//! spending and ECDSA signature checks.
//!
//! # Security
//! Script execution enforces limits to prevent DoS attacks:
//! - Maximum script size: 10,000 bytes (Bitcoin-compatible)
//! - Maximum operations: 201 operations per script

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, PublicKey, Signature};

/// Maximum script size in bytes (Bitcoin-compatible limit)
const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum number of operations per script (Bitcoin-compatible limit)
const MAX_SCRIPT_OPS: usize = 201;

/// A script for transaction input/output validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    operations: Vec<ScriptOp>,
}

/// Script operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptOp {
    /// Push data onto the stack
    PushData(Vec<u8>),
    /// Duplicate top stack item
    OpDup,
    /// Hash top stack item with RIPEMD-160(SHA-256(x))
    OpHash160,
    /// Check if top two stack items are equal
    OpEqual,
    /// Verify equality and fail if false
    OpEqualVerify,
    /// Verify ECDSA signature
    OpCheckSig,
    /// Verify ECDSA signature and fail if false
    OpCheckSigVerify,
    /// Check if top stack item is true
    OpVerify,
    /// Return true (always succeeds)
    OpTrue,
    /// Return false (always fails)
    OpFalse,
}

impl Script {
    /// Create an empty script
    pub fn new() -> Self {
        Script {
            operations: Vec::new(),
        }
    }

    /// Create script from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Script {
            operations: vec![ScriptOp::PushData(data)],
        }
    }

    /// Create a Pay-to-PubkeyHash (P2PKH) locking script
    pub fn pay_to_pubkey_hash(pubkey_hash: [u8; 20]) -> Self {
        Script {
            operations: vec![
                ScriptOp::OpDup,
                ScriptOp::OpHash160,
                ScriptOp::PushData(pubkey_hash.to_vec()),
                ScriptOp::OpEqualVerify,
                ScriptOp::OpCheckSig,
            ],
        }
    }

    /// Create a script to unlock P2PKH: pushes signature then public key
    pub fn unlock_p2pkh(signature: &Signature, public_key: &PublicKey) -> Self {
        Script {
            operations: vec![
                ScriptOp::PushData(signature.to_der()),
                ScriptOp::PushData(public_key.serialize().to_vec()),
            ],
        }
    }

    /// Create a script that always returns true
    pub fn always_true() -> Self {
        Script {
            operations: vec![ScriptOp::OpTrue],
        }
    }

    /// Create a script that always returns false
    pub fn always_false() -> Self {
        Script {
            operations: vec![ScriptOp::OpFalse],
        }
    }

    /// Add an operation to the script
    pub fn push_op(&mut self, op: ScriptOp) {
        self.operations.push(op);
    }

    /// Add data push operation
    pub fn push_data(&mut self, data: Vec<u8>) {
        self.operations.push(ScriptOp::PushData(data));
    }

    /// Get script operations
    pub fn operations(&self) -> &[ScriptOp] {
        &self.operations
    }

    /// Check if script contains the genesis message (for coinbase validation)
    pub fn contains_genesis_message(&self) -> bool {
        for op in &self.operations {
            if let ScriptOp::PushData(data) = op {
                if let Ok(message) = std::str::from_utf8(data) {
                    if message.contains("Genesis") {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Get the script size in bytes
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    /// Serialize script to bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        for op in &self.operations {
            match op {
                ScriptOp::PushData(data) => {
                    if data.len() <= 75 {
                        bytes.push(data.len() as u8);
                        bytes.extend_from_slice(data);
                    } else {
                        bytes.push(76); // OP_PUSHDATA1
                        bytes.push(data.len() as u8);
                        bytes.extend_from_slice(data);
                    }
                }
                ScriptOp::OpDup => bytes.push(118),
                ScriptOp::OpHash160 => bytes.push(169),
                ScriptOp::OpEqual => bytes.push(135),
                ScriptOp::OpEqualVerify => bytes.push(136),
                ScriptOp::OpCheckSig => bytes.push(172),
                ScriptOp::OpCheckSigVerify => bytes.push(173),
                ScriptOp::OpVerify => bytes.push(105),
                ScriptOp::OpTrue => bytes.push(81),
                ScriptOp::OpFalse => bytes.push(0),
            }
        }

        bytes
    }

    /// Deserialize script from bytes
    ///
    /// # Security
    /// Enforces maximum script size to prevent DoS attacks
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ScriptError> {
        if bytes.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptError::ScriptTooLarge);
        }

        let mut operations = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let opcode = bytes[i];
            i += 1;

            match opcode {
                0 => operations.push(ScriptOp::OpFalse),
                1..=75 => {
                    let data_len = opcode as usize;
                    if i + data_len > bytes.len() {
                        return Err(ScriptError::InvalidScript);
                    }
                    let data = bytes[i..i + data_len].to_vec();
                    operations.push(ScriptOp::PushData(data));
                    i += data_len;
                }
                76 => {
                    if i >= bytes.len() {
                        return Err(ScriptError::InvalidScript);
                    }
                    let data_len = bytes[i] as usize;
                    i += 1;
                    if i + data_len > bytes.len() {
                        return Err(ScriptError::InvalidScript);
                    }
                    let data = bytes[i..i + data_len].to_vec();
                    operations.push(ScriptOp::PushData(data));
                    i += data_len;
                }
                81 => operations.push(ScriptOp::OpTrue),
                105 => operations.push(ScriptOp::OpVerify),
                118 => operations.push(ScriptOp::OpDup),
                135 => operations.push(ScriptOp::OpEqual),
                136 => operations.push(ScriptOp::OpEqualVerify),
                169 => operations.push(ScriptOp::OpHash160),
                172 => operations.push(ScriptOp::OpCheckSig),
                173 => operations.push(ScriptOp::OpCheckSigVerify),
                _ => return Err(ScriptError::UnsupportedOpcode),
            }
        }

        if operations.len() > MAX_SCRIPT_OPS {
            return Err(ScriptError::TooManyOperations);
        }

        Ok(Script { operations })
    }

    /// Execute the script with given context
    ///
    /// # Security
    /// Enforces maximum operation count to prevent DoS attacks
    pub fn execute(&self, context: &ScriptContext) -> Result<bool, ScriptError> {
        if self.operations.len() > MAX_SCRIPT_OPS {
            return Err(ScriptError::TooManyOperations);
        }

        let mut stack = Vec::new();
        let engine = ScriptEngine::new(context);

        for op in &self.operations {
            engine.execute_op(op, &mut stack)?;
        }

        if stack.len() == 1 {
            Ok(engine.is_true(&stack[0]))
        } else {
            Ok(false)
        }
    }

    /// Convert script to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.serialize()
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.operations.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match op {
                ScriptOp::PushData(data) => {
                    if data.len() <= 8 {
                        write!(f, "{}", hex::encode(data))?;
                    } else {
                        write!(f, "{}...", hex::encode(&data[..8]))?;
                    }
                }
                ScriptOp::OpDup => write!(f, "OP_DUP")?,
                ScriptOp::OpHash160 => write!(f, "OP_HASH160")?,
                ScriptOp::OpEqual => write!(f, "OP_EQUAL")?,
                ScriptOp::OpEqualVerify => write!(f, "OP_EQUALVERIFY")?,
                ScriptOp::OpCheckSig => write!(f, "OP_CHECKSIG")?,
                ScriptOp::OpCheckSigVerify => write!(f, "OP_CHECKSIGVERIFY")?,
                ScriptOp::OpVerify => write!(f, "OP_VERIFY")?,
                ScriptOp::OpTrue => write!(f, "OP_TRUE")?,
                ScriptOp::OpFalse => write!(f, "OP_FALSE")?,
            }
        }
        Ok(())
    }
}

/// Context for script execution: the signature hash it verifies against.
pub struct ScriptContext {
    pub sighash: Hash,
}

/// Script execution engine
struct ScriptEngine<'a> {
    context: &'a ScriptContext,
}

impl<'a> ScriptEngine<'a> {
    fn new(context: &'a ScriptContext) -> Self {
        ScriptEngine { context }
    }

    fn execute_op(&self, op: &ScriptOp, stack: &mut Vec<Vec<u8>>) -> Result<(), ScriptError> {
        match op {
            ScriptOp::PushData(data) => {
                stack.push(data.clone());
            }
            ScriptOp::OpDup => {
                let top = stack.last().ok_or(ScriptError::StackUnderflow)?.clone();
                stack.push(top);
            }
            ScriptOp::OpHash160 => {
                let data = stack.pop().ok_or(ScriptError::StackUnderflow)?;
                let pk = PublicKey::from_bytes(&data).map_err(|_| ScriptError::InvalidPublicKey)?;
                stack.push(pk.hash160().to_vec());
            }
            ScriptOp::OpEqual => {
                if stack.len() < 2 {
                    return Err(ScriptError::StackUnderflow);
                }
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                stack.push(if a == b { vec![1] } else { vec![0] });
            }
            ScriptOp::OpEqualVerify => {
                if stack.len() < 2 {
                    return Err(ScriptError::StackUnderflow);
                }
                let b = stack.pop().unwrap();
                let a = stack.pop().unwrap();
                if a != b {
                    return Err(ScriptError::VerificationFailed);
                }
            }
            ScriptOp::OpCheckSig => {
                if stack.len() < 2 {
                    return Err(ScriptError::StackUnderflow);
                }
                let pubkey_bytes = stack.pop().unwrap();
                let signature_bytes = stack.pop().unwrap();
                let is_valid = self.verify_signature(&signature_bytes, &pubkey_bytes)?;
                stack.push(if is_valid { vec![1] } else { vec![0] });
            }
            ScriptOp::OpCheckSigVerify => {
                if stack.len() < 2 {
                    return Err(ScriptError::StackUnderflow);
                }
                let pubkey_bytes = stack.pop().unwrap();
                let signature_bytes = stack.pop().unwrap();
                let is_valid = self.verify_signature(&signature_bytes, &pubkey_bytes)?;
                if !is_valid {
                    return Err(ScriptError::SignatureVerificationFailed);
                }
            }
            ScriptOp::OpVerify => {
                let value = stack.pop().ok_or(ScriptError::StackUnderflow)?;
                if !self.is_true(&value) {
                    return Err(ScriptError::VerificationFailed);
                }
            }
            ScriptOp::OpTrue => stack.push(vec![1]),
            ScriptOp::OpFalse => stack.push(vec![0]),
        }
        Ok(())
    }

    fn verify_signature(
        &self,
        signature_bytes: &[u8],
        pubkey_bytes: &[u8],
    ) -> Result<bool, ScriptError> {
        let signature =
            Signature::from_der(signature_bytes).map_err(|_| ScriptError::InvalidSignature)?;
        let public_key =
            PublicKey::from_bytes(pubkey_bytes).map_err(|_| ScriptError::InvalidPublicKey)?;
        Ok(public_key.verify(&self.context.sighash, &signature))
    }

    fn is_true(&self, data: &[u8]) -> bool {
        !data.is_empty() && data.iter().any(|&b| b != 0)
    }
}

/// Error types for script operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("invalid script format")]
    InvalidScript,
    #[error("unsupported opcode")]
    UnsupportedOpcode,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("verification failed")]
    VerificationFailed,
    #[error("signature verification failed")]
    SignatureVerificationFailed,
    #[error("invalid signature format")]
    InvalidSignature,
    #[error("invalid public key format")]
    InvalidPublicKey,
    #[error("script too large")]
    ScriptTooLarge,
    #[error("too many operations")]
    TooManyOperations,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    #[test]
    fn script_creation() {
        let key = PrivateKey::generate();
        let hash160 = key.public_key().hash160();
        let p2pkh_script = Script::pay_to_pubkey_hash(hash160);

        assert!(!p2pkh_script.operations.is_empty());
        assert_eq!(p2pkh_script.operations[0], ScriptOp::OpDup);
    }

    #[test]
    fn script_serialization_roundtrips() {
        let script = Script::always_true();
        let serialized = script.serialize();
        let deserialized = Script::deserialize(&serialized).unwrap();
        assert_eq!(script, deserialized);
    }

    #[test]
    fn simple_script_execution() {
        let context = ScriptContext {
            sighash: Hash::double_sha256(b"tx"),
        };

        let result = Script::always_true().execute(&context).unwrap();
        assert!(result);

        let result = Script::always_false().execute(&context).unwrap();
        assert!(!result);
    }

    #[test]
    fn p2pkh_round_trip_verifies() {
        let key = PrivateKey::generate();
        let sighash = Hash::double_sha256(b"pay bob 3 coins");
        let signature = key.sign(&sighash);

        let lock = Script::pay_to_pubkey_hash(key.public_key().hash160());
        let unlock = Script::unlock_p2pkh(&signature, &key.public_key());

        let mut combined = unlock.operations().to_vec();
        combined.extend(lock.operations().iter().cloned());
        let script = Script {
            operations: combined,
        };

        let context = ScriptContext { sighash };
        assert!(script.execute(&context).unwrap());
    }

    #[test]
    fn deserialize_rejects_oversized_script() {
        let bytes = vec![0u8; MAX_SCRIPT_SIZE + 1];
        assert_eq!(
            Script::deserialize(&bytes).unwrap_err(),
            ScriptError::ScriptTooLarge
        );
    }
}
