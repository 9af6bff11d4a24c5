//! Message framing: 4-byte magic, 12-byte null-padded command, 4-byte
//! little-endian payload length, 4-byte checksum.

use crate::crypto::Hash;

pub const MAGIC_LEN: usize = 4;
pub const COMMAND_LEN: usize = 12;
pub const HEADER_LEN: usize = MAGIC_LEN + COMMAND_LEN + 4 + 4;

#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub magic: [u8; MAGIC_LEN],
    pub command: String,
    pub length: u32,
    pub checksum: [u8; 4],
}

impl FrameHeader {
    pub fn new(magic: [u8; MAGIC_LEN], command: &str, payload: &[u8]) -> Self {
        FrameHeader {
            magic,
            command: command.to_string(),
            length: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic);

        let mut cmd_bytes = [0u8; COMMAND_LEN];
        let cmd_slice = self.command.as_bytes();
        cmd_bytes[..cmd_slice.len()].copy_from_slice(cmd_slice);
        out.extend_from_slice(&cmd_bytes);

        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.checksum);
    }

    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let magic: [u8; MAGIC_LEN] = bytes[0..4].try_into().unwrap();
        let command = String::from_utf8_lossy(&bytes[4..16])
            .trim_end_matches('\0')
            .to_string();
        let length = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let checksum: [u8; 4] = bytes[20..24].try_into().unwrap();
        FrameHeader {
            magic,
            command,
            length,
            checksum,
        }
    }

    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum == checksum(payload)
    }
}

pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let hash = Hash::double_sha256(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_wire_bytes()[..4]);
    out
}
