//! Wire codec: message framing and the binary encoding shared by every
//! protocol message.
//!
//! Encoding rules: fixed-width little-endian integers, `VarInt`-prefixed
//! byte strings and vectors, hashes written in their native wire order (see
//! `crypto::Hash`, which already stores bytes that way internally).

pub mod codec;
pub mod framing;
pub mod message;
pub mod transport;

pub use codec::{OffsetReader, WireDecode, WireEncode};
pub use framing::{FrameHeader, COMMAND_LEN, MAGIC_LEN};
pub use message::{
    GetBlocksMessage, InvType, InventoryVector, Message, NetworkAddress, ServiceFlags,
    VersionMessage,
};
pub use transport::FramedTransport;

use thiserror::Error;

use crate::util::VarIntError;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unexpected end of input at offset {offset}")]
    Truncated { offset: usize },
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("payload checksum mismatch")]
    InvalidChecksum,
    #[error("message {command:?} exceeds size limit: {size} bytes (max {max})")]
    MessageTooLarge {
        command: String,
        size: usize,
        max: usize,
    },
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("invalid command name encoding")]
    InvalidCommand,
    #[error("malformed message body at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VarIntError> for WireError {
    fn from(err: VarIntError) -> Self {
        match err {
            VarIntError::Truncated { offset } => WireError::Truncated { offset },
        }
    }
}

pub type WireResult<T> = Result<T, WireError>;
