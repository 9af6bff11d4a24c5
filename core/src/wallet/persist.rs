//! Wallet file format: magic marker, version, keys, then the four pools in
//! fixed order. Round-trips exactly (`load(save(w)) == w`); nothing here
//! depends on wall-clock time or any ambient configuration.

use std::io::{self, Write};

use crate::{
    blockchain::Transaction,
    crypto::PrivateKey,
    wallet::{pool::Pool, Wallet, WalletError},
    wire::{
        codec::{write_varint, write_varstring, OffsetReader, WireDecode, WireEncode},
        WireError,
    },
};

const WALLET_MAGIC: [u8; 4] = *b"SVPW";
const WALLET_FORMAT_VERSION: u32 = 1;

pub fn save(wallet: &Wallet) -> Vec<u8> {
    let mut buf = Vec::new();
    write_to(wallet, &mut buf).expect("writing to a Vec never fails");
    buf
}

fn write_to<W: Write>(wallet: &Wallet, w: &mut W) -> io::Result<()> {
    w.write_all(&WALLET_MAGIC)?;
    w.write_all(&WALLET_FORMAT_VERSION.to_le_bytes())?;

    write_varint(w, wallet.keyring.keys().len() as u64)?;
    for key in wallet.keyring.keys() {
        w.write_all(&key.to_bytes())?;
        write_varstring(w, "")?;
    }

    write_pool(w, &wallet.unspent)?;
    write_pool(w, &wallet.spent)?;
    write_pool(w, &wallet.pending)?;
    write_pool(w, &wallet.dead)?;
    Ok(())
}

fn write_pool<W: Write>(w: &mut W, pool: &Pool) -> io::Result<()> {
    write_varint(w, pool.len() as u64)?;
    for tx in pool.values() {
        tx.write_to(w)?;
    }
    Ok(())
}

pub fn load(bytes: &[u8]) -> Result<Wallet, WalletError> {
    let mut r = OffsetReader::new(bytes);

    let mut magic = [0u8; 4];
    for slot in magic.iter_mut() {
        *slot = r.read_u8()?;
    }
    if magic != WALLET_MAGIC {
        return Err(WalletError::BadFormat("wallet file magic mismatch".into()));
    }

    let version = r.read_u32_le()?;
    if version != WALLET_FORMAT_VERSION {
        return Err(WalletError::BadFormat(format!(
            "unsupported wallet file version {version}"
        )));
    }

    let mut wallet = Wallet::new();

    let key_count = r.read_varint()? as usize;
    for _ in 0..key_count {
        let mut scalar = [0u8; 32];
        for slot in scalar.iter_mut() {
            *slot = r.read_u8()?;
        }
        let _label = r.read_varstring()?;
        let key = PrivateKey::from_bytes(scalar)
            .map_err(|_| WalletError::BadFormat("invalid key scalar in wallet file".into()))?;
        wallet.add_key(key);
    }

    wallet.unspent = read_pool(&mut r)?;
    wallet.spent = read_pool(&mut r)?;
    wallet.pending = read_pool(&mut r)?;
    wallet.dead = read_pool(&mut r)?;

    Ok(wallet)
}

fn read_pool<R: std::io::Read>(r: &mut OffsetReader<R>) -> Result<Pool, WireError> {
    let count = r.read_varint()? as usize;
    let mut pool = Pool::new();
    for _ in 0..count {
        let tx = Transaction::read_from(r)?;
        pool.insert(tx.txid(), tx);
    }
    Ok(pool)
}
