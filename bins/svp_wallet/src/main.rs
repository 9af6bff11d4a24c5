//! Offline wallet CLI: manages a wallet file and builds signed transactions.
//!
//! Broadcasting a transaction built by `send` is left to the caller (relay it
//! through `svp_node` or any other peer connection); this binary never opens
//! a network connection itself.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use btpc_core::{
    crypto::{Address, PrivateKey},
    wallet::{persist, Wallet},
    wire::WireEncode,
    Network,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "svp-wallet", about = "Offline wallet for an SVP client")]
struct Cli {
    /// Wallet file to operate on.
    #[arg(long, default_value = "wallet.dat")]
    wallet_file: PathBuf,

    /// Network the printed address is encoded for.
    #[arg(long, default_value = "testnet")]
    network: Network,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new wallet file with one freshly generated key.
    Create,
    /// Print the available and estimated balance.
    Balance,
    /// Print every key's address.
    Addresses,
    /// Build, sign, and record a payment as pending; prints the raw tx hex.
    Send {
        /// Recipient address.
        to: String,
        /// Amount in the base unit.
        amount: u64,
        /// Change address; defaults to one of the wallet's own keys.
        #[arg(long)]
        change: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Create => create(&cli.wallet_file, cli.network),
        Command::Balance => balance(&cli.wallet_file),
        Command::Addresses => addresses(&cli.wallet_file, cli.network),
        Command::Send { to, amount, change } => {
            send(&cli.wallet_file, cli.network, &to, amount, change.as_deref())
        }
    }
}

fn create(path: &PathBuf, network: Network) -> Result<()> {
    if path.exists() {
        bail!("wallet file {} already exists", path.display());
    }
    let mut wallet = Wallet::new();
    let key = PrivateKey::generate();
    let address = Address::from_public_key(&key.public_key(), network);
    wallet.add_key(key);
    std::fs::write(path, persist::save(&wallet))
        .with_context(|| format!("writing {}", path.display()))?;
    println!("created {}", path.display());
    println!("address: {address}");
    Ok(())
}

fn balance(path: &PathBuf) -> Result<()> {
    let wallet = load(path)?;
    println!("available: {}", wallet.available_balance());
    println!("estimated: {}", wallet.estimated_balance());
    Ok(())
}

fn addresses(path: &PathBuf, network: Network) -> Result<()> {
    let wallet = load(path)?;
    for key in wallet.keys() {
        println!("{}", Address::from_public_key(&key.public_key(), network));
    }
    Ok(())
}

fn send(path: &PathBuf, network: Network, to: &str, amount: u64, change: Option<&str>) -> Result<()> {
    let mut wallet = load(path)?;

    let to_address = Address::from_string(to).with_context(|| format!("parsing address {to}"))?;
    if to_address.network() != network {
        bail!("recipient address is encoded for a different network");
    }

    let change_hash160 = change
        .map(Address::from_string)
        .transpose()
        .context("parsing change address")?
        .map(|addr| *addr.hash160());

    let tx = wallet.create_send(*to_address.hash160(), amount, change_hash160)?;
    wallet.confirm_send(tx.clone());
    std::fs::write(path, persist::save(&wallet))
        .with_context(|| format!("saving {}", path.display()))?;

    println!("{}", hex::encode(tx.encode_to_vec()));
    Ok(())
}

fn load(path: &PathBuf) -> Result<Wallet> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(persist::load(&bytes)?)
}
