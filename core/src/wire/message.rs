//! Protocol message bodies.
//!
//! Only the messages named in the external-interfaces contract are
//! implemented: `version`/`verack`, `inv`/`getdata`, `getblocks`, `block`,
//! `tx`, and `addr` (accepted but otherwise ignored).

use std::net::{IpAddr, Ipv4Addr};

use crate::{
    blockchain::{Block, Transaction},
    crypto::Hash,
    wire::{
        codec::{write_hash, write_varint, write_varstring, OffsetReader, WireDecode, WireEncode},
        WireError,
    },
    PROTOCOL_VERSION,
};

/// Node service bitmask flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceFlags(pub u64);

impl ServiceFlags {
    pub const NONE: ServiceFlags = ServiceFlags(0);
    pub const NETWORK: ServiceFlags = ServiceFlags(1);
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAddress {
    pub time: u32,
    pub services: u64,
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for NetworkAddress {
    fn default() -> Self {
        NetworkAddress {
            time: 0,
            services: 0,
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl WireEncode for NetworkAddress {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.time.to_le_bytes())?;
        w.write_all(&self.services.to_le_bytes())?;
        match self.ip {
            IpAddr::V4(v4) => {
                w.write_all(&[0u8; 12])?;
                w.write_all(&v4.octets())?;
            }
            IpAddr::V6(v6) => {
                w.write_all(&v6.octets())?;
            }
        }
        w.write_all(&self.port.to_le_bytes())
    }
}

impl WireDecode for NetworkAddress {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let time = r.read_u32_le()?;
        let services = r.read_u64_le()?;
        let ip_bytes = r.read_vec(16)?;
        let ip = if ip_bytes[..12] == [0u8; 12] {
            IpAddr::V4(Ipv4Addr::new(
                ip_bytes[12],
                ip_bytes[13],
                ip_bytes[14],
                ip_bytes[15],
            ))
        } else {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&ip_bytes);
            IpAddr::V6(octets.into())
        };
        let port_bytes = r.read_vec(2)?;
        let port = u16::from_le_bytes([port_bytes[0], port_bytes[1]]);
        Ok(NetworkAddress {
            time,
            services,
            ip,
            port,
        })
    }
}

#[derive(Debug, Clone)]
pub struct VersionMessage {
    pub version: u32,
    pub services: u64,
    pub timestamp: i64,
    pub addr_recv: NetworkAddress,
    pub addr_from: NetworkAddress,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: u32,
    pub relay: bool,
}

impl VersionMessage {
    pub fn new(
        services: ServiceFlags,
        addr_recv: NetworkAddress,
        addr_from: NetworkAddress,
        user_agent: String,
        start_height: u32,
        relay: bool,
        timestamp: i64,
        nonce: u64,
    ) -> Self {
        VersionMessage {
            version: PROTOCOL_VERSION,
            services: services.0,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
            relay,
        }
    }
}

impl WireEncode for VersionMessage {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.services.to_le_bytes())?;
        w.write_all(&self.timestamp.to_le_bytes())?;
        self.addr_recv.write_to(w)?;
        self.addr_from.write_to(w)?;
        w.write_all(&self.nonce.to_le_bytes())?;
        write_varstring(w, &self.user_agent)?;
        w.write_all(&self.start_height.to_le_bytes())?;
        w.write_all(&[self.relay as u8])
    }
}

impl WireDecode for VersionMessage {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        Ok(VersionMessage {
            version: r.read_u32_le()?,
            services: r.read_u64_le()?,
            timestamp: r.read_i64_le()?,
            addr_recv: NetworkAddress::read_from(r)?,
            addr_from: NetworkAddress::read_from(r)?,
            nonce: r.read_u64_le()?,
            user_agent: r.read_varstring()?,
            start_height: r.read_u32_le()?,
            relay: r.read_bool()?,
        })
    }
}

/// Inventory object types. `Tx = 1`, `Block = 2` per the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum InvType {
    Tx = 1,
    Block = 2,
}

impl InvType {
    fn from_u32(value: u32) -> Result<Self, WireError> {
        match value {
            1 => Ok(InvType::Tx),
            2 => Ok(InvType::Block),
            other => Err(WireError::Malformed {
                offset: 0,
                reason: format!("unknown inventory type {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryVector {
    pub inv_type: InvType,
    pub hash: Hash,
}

impl WireEncode for InventoryVector {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&(self.inv_type as u32).to_le_bytes())?;
        write_hash(w, &self.hash)
    }
}

impl WireDecode for InventoryVector {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let inv_type = InvType::from_u32(r.read_u32_le()?)?;
        let hash = r.read_hash()?;
        Ok(InventoryVector { inv_type, hash })
    }
}

fn write_inventory_vec<W: std::io::Write>(
    w: &mut W,
    items: &[InventoryVector],
) -> std::io::Result<()> {
    write_varint(w, items.len() as u64)?;
    for item in items {
        item.write_to(w)?;
    }
    Ok(())
}

fn read_inventory_vec<R: std::io::Read>(
    r: &mut OffsetReader<R>,
) -> Result<Vec<InventoryVector>, WireError> {
    let count = r.read_varint()? as usize;
    (0..count).map(|_| InventoryVector::read_from(r)).collect()
}

#[derive(Debug, Clone)]
pub struct GetBlocksMessage {
    pub version: u32,
    pub locator_hashes: Vec<Hash>,
    pub stop_hash: Hash,
}

impl WireEncode for GetBlocksMessage {
    fn write_to<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.version.to_le_bytes())?;
        write_varint(w, self.locator_hashes.len() as u64)?;
        for hash in &self.locator_hashes {
            write_hash(w, hash)?;
        }
        write_hash(w, &self.stop_hash)
    }
}

impl WireDecode for GetBlocksMessage {
    fn read_from<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Self, WireError> {
        let version = r.read_u32_le()?;
        let count = r.read_varint()? as usize;
        let locator_hashes = (0..count).map(|_| r.read_hash()).collect::<Result<_, _>>()?;
        let stop_hash = r.read_hash()?;
        Ok(GetBlocksMessage {
            version,
            locator_hashes,
            stop_hash,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Version(VersionMessage),
    VerAck,
    GetAddr,
    Addr(Vec<NetworkAddress>),
    Inv(Vec<InventoryVector>),
    GetData(Vec<InventoryVector>),
    GetBlocks(GetBlocksMessage),
    Block(Block),
    Tx(Transaction),
    NotFound(Vec<InventoryVector>),
}

/// Bitcoin's own inventory/address vector limits, carried over as a DoS
/// safeguard for the decoder.
pub const MAX_INV_ITEMS: usize = 50_000;
pub const MAX_ADDR_ITEMS: usize = 1_000;

impl Message {
    pub fn command(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::VerAck => "verack",
            Message::GetAddr => "getaddr",
            Message::Addr(_) => "addr",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::GetBlocks(_) => "getblocks",
            Message::Block(_) => "block",
            Message::Tx(_) => "tx",
            Message::NotFound(_) => "notfound",
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Message::Version(msg) => msg.write_to(&mut buf).unwrap(),
            Message::VerAck | Message::GetAddr => {}
            Message::Addr(addrs) => {
                write_varint(&mut buf, addrs.len() as u64).unwrap();
                for addr in addrs {
                    addr.write_to(&mut buf).unwrap();
                }
            }
            Message::Inv(items) | Message::GetData(items) | Message::NotFound(items) => {
                write_inventory_vec(&mut buf, items).unwrap()
            }
            Message::GetBlocks(msg) => msg.write_to(&mut buf).unwrap(),
            Message::Block(block) => block.write_to(&mut buf).unwrap(),
            Message::Tx(tx) => tx.write_to(&mut buf).unwrap(),
        }
        buf
    }

    pub fn decode_payload(command: &str, payload: &[u8]) -> Result<Self, WireError> {
        let mut r = OffsetReader::new(payload);
        let message = match command {
            "version" => Message::Version(VersionMessage::read_from(&mut r)?),
            "verack" => Message::VerAck,
            "getaddr" => Message::GetAddr,
            "addr" => {
                let count = r.read_varint()? as usize;
                if count > MAX_ADDR_ITEMS {
                    return Err(WireError::Malformed {
                        offset: r.offset(),
                        reason: format!("addr count {count} exceeds limit {MAX_ADDR_ITEMS}"),
                    });
                }
                let addrs = (0..count)
                    .map(|_| NetworkAddress::read_from(&mut r))
                    .collect::<Result<_, _>>()?;
                Message::Addr(addrs)
            }
            "inv" => Message::Inv(read_bounded_inventory(&mut r)?),
            "getdata" => Message::GetData(read_bounded_inventory(&mut r)?),
            "notfound" => Message::NotFound(read_bounded_inventory(&mut r)?),
            "getblocks" => Message::GetBlocks(GetBlocksMessage::read_from(&mut r)?),
            "block" => Message::Block(Block::read_from(&mut r)?),
            "tx" => Message::Tx(Transaction::read_from(&mut r)?),
            other => return Err(WireError::UnknownCommand(other.to_string())),
        };
        Ok(message)
    }
}

fn read_bounded_inventory<R: std::io::Read>(
    r: &mut OffsetReader<R>,
) -> Result<Vec<InventoryVector>, WireError> {
    let count = r.read_varint()? as usize;
    if count > MAX_INV_ITEMS {
        return Err(WireError::Malformed {
            offset: r.offset(),
            reason: format!("inventory count {count} exceeds limit {MAX_INV_ITEMS}"),
        });
    }
    (0..count).map(|_| InventoryVector::read_from(r)).collect()
}
