//! Prints and verifies the fixed genesis block for a network.
//!
//! Genesis blocks are no longer user-configurable: each network's
//! `NetworkParams` fully determines its genesis block, so this tool exists
//! only to inspect and sanity-check that fixed block rather than to mint one.

use anyhow::{Context, Result};
use btpc_core::{blockchain::NetworkParams, Network};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "genesis-tool", about = "Inspect a network's fixed genesis block")]
struct Cli {
    /// Network to print the genesis block for.
    #[arg(long, default_value = "testnet")]
    network: Network,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let params = NetworkParams::for_network(cli.network);
    let genesis = params.genesis();

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("system clock before the epoch")?
        .as_secs();
    genesis
        .verify(&params.pow_limit, now)
        .context("fixed genesis block failed its own verification")?;

    println!("network: {}", cli.network.as_str());
    println!("hash: {}", genesis.hash());
    println!("merkle_root: {}", genesis.header.merkle_root);
    println!("time: {}", genesis.header.time);
    println!("bits: {:#010x}", genesis.header.bits);
    println!("nonce: {}", genesis.header.nonce);
    println!("transactions: {}", genesis.transactions.len());
    Ok(())
}
