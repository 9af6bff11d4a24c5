//! Transactions: inputs, outputs, and the coinbase-placement invariant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    blockchain::constants::{MAX_TRANSACTION_INPUTS, MAX_TRANSACTION_OUTPUTS, MAX_TRANSACTION_SIZE},
    crypto::{Hash, Script},
    wire::{
        codec::{write_varint, OffsetReader, WireDecode, WireEncode},
        WireError,
    },
};

/// A transaction: version, inputs, outputs, and a lock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// A coinbase transaction: single input with a null previous-output.
    pub fn coinbase(reward: u64, recipient_hash: [u8; 20]) -> Self {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                previous_output: OutPoint::null(),
                script_sig: Script::new(),
                sequence: 0xffffffff,
            }],
            outputs: vec![TransactionOutput {
                value: reward,
                script_pubkey: Script::pay_to_pubkey_hash(recipient_hash),
            }],
            lock_time: 0,
        }
    }

    /// Coinbase invariant: a single input whose previous-output is null.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Transaction identity: double-SHA256 of the full wire serialization.
    pub fn txid(&self) -> Hash {
        Hash::double_sha256(&self.encode_to_vec())
    }

    pub fn size(&self) -> usize {
        self.encode_to_vec().len()
    }

    pub fn is_oversized(&self) -> bool {
        self.size() > MAX_TRANSACTION_SIZE
    }

    pub fn validate_structure(&self) -> Result<(), TransactionError> {
        if self.version == 0 {
            return Err(TransactionError::InvalidVersion);
        }
        if self.inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        if self.inputs.len() > MAX_TRANSACTION_INPUTS {
            return Err(TransactionError::TooManyInputs);
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if self.outputs.len() > MAX_TRANSACTION_OUTPUTS {
            return Err(TransactionError::TooManyOutputs);
        }
        if self.is_oversized() {
            return Err(TransactionError::TransactionTooLarge);
        }
        for output in &self.outputs {
            output.validate()?;
        }
        for input in &self.inputs {
            input.validate()?;
        }
        for i in 0..self.inputs.len() {
            for j in (i + 1)..self.inputs.len() {
                if self.inputs[i].previous_output == self.inputs[j].previous_output {
                    return Err(TransactionError::DuplicateInput);
                }
            }
        }
        Ok(())
    }

    pub fn total_output_value(&self) -> Result<u64, TransactionError> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.value)
                .ok_or(TransactionError::ValueOverflow)?;
        }
        Ok(total)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl WireEncode for Transaction {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.version.to_le_bytes())?;
        write_varint(w, self.inputs.len() as u64)?;
        for input in &self.inputs {
            input.write_to(w)?;
        }
        write_varint(w, self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.write_to(w)?;
        }
        w.write_all(&self.lock_time.to_le_bytes())
    }
}

impl WireDecode for Transaction {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let version = r.read_u32_le()?;
        let input_count = r.read_varint()? as usize;
        let inputs = (0..input_count)
            .map(|_| TransactionInput::read_from(r))
            .collect::<Result<_, _>>()?;
        let output_count = r.read_varint()? as usize;
        let outputs = (0..output_count)
            .map(|_| TransactionOutput::read_from(r))
            .collect::<Result<_, _>>()?;
        let lock_time = r.read_u32_le()?;
        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}

/// A transaction input: a reference to a previous output plus its unlock
/// script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub previous_output: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TransactionInput {
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.script_sig.size() > MAX_TRANSACTION_SIZE / 2 {
            return Err(TransactionError::ScriptTooLarge);
        }
        Ok(())
    }
}

impl WireEncode for TransactionInput {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.previous_output.write_to(w)?;
        let script_bytes = self.script_sig.serialize();
        write_varint(w, script_bytes.len() as u64)?;
        w.write_all(&script_bytes)?;
        w.write_all(&self.sequence.to_le_bytes())
    }
}

impl WireDecode for TransactionInput {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let previous_output = OutPoint::read_from(r)?;
        let script_len = r.read_varint()? as usize;
        let script_bytes = r.read_vec(script_len)?;
        let script_sig = Script::deserialize(&script_bytes).map_err(|e| WireError::Malformed {
            offset: r.offset(),
            reason: e.to_string(),
        })?;
        let sequence = r.read_u32_le()?;
        Ok(TransactionInput {
            previous_output,
            script_sig,
            sequence,
        })
    }
}

/// A transaction output: value in base units and a lock script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_pubkey: Script,
}

/// Maximum value of a single output, mirroring the 21M-coin supply cap.
const MAX_OUTPUT_VALUE: u64 = 21_000_000 * 100_000_000;

impl TransactionOutput {
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.value == 0 {
            return Err(TransactionError::ZeroValue);
        }
        if self.value > MAX_OUTPUT_VALUE {
            return Err(TransactionError::ValueTooLarge);
        }
        if self.script_pubkey.size() > MAX_TRANSACTION_SIZE / 2 {
            return Err(TransactionError::ScriptTooLarge);
        }
        Ok(())
    }
}

impl WireEncode for TransactionOutput {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.value.to_le_bytes())?;
        let script_bytes = self.script_pubkey.serialize();
        write_varint(w, script_bytes.len() as u64)?;
        w.write_all(&script_bytes)
    }
}

impl WireDecode for TransactionOutput {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let value = r.read_u64_le()?;
        let script_len = r.read_varint()? as usize;
        let script_bytes = r.read_vec(script_len)?;
        let script_pubkey =
            Script::deserialize(&script_bytes).map_err(|e| WireError::Malformed {
                offset: r.offset(),
                reason: e.to_string(),
            })?;
        Ok(TransactionOutput {
            value,
            script_pubkey,
        })
    }
}

/// Reference to a previous transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, vout: u32) -> Self {
        OutPoint { txid, vout }
    }

    /// The null outpoint used by coinbase inputs: 32 zero bytes, index
    /// `0xFFFFFFFF`.
    pub fn null() -> Self {
        OutPoint {
            txid: Hash::zero(),
            vout: 0xffffffff,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid == Hash::zero() && self.vout == 0xffffffff
    }
}

impl WireEncode for OutPoint {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(self.txid.as_wire_bytes())?;
        w.write_all(&self.vout.to_le_bytes())
    }
}

impl WireDecode for OutPoint {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let txid = r.read_hash()?;
        let vout = r.read_u32_le()?;
        Ok(OutPoint { txid, vout })
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("invalid transaction version")]
    InvalidVersion,
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("too many transaction inputs")]
    TooManyInputs,
    #[error("too many transaction outputs")]
    TooManyOutputs,
    #[error("transaction too large")]
    TransactionTooLarge,
    #[error("output has zero value")]
    ZeroValue,
    #[error("output value too large")]
    ValueTooLarge,
    #[error("value overflow")]
    ValueOverflow,
    #[error("script too large")]
    ScriptTooLarge,
    #[error("duplicate transaction input")]
    DuplicateInput,
}
