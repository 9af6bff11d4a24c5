//! SVP node: connects to a single upstream peer, catches the local chain up
//! to its tip via block-locator download, then stays connected applying
//! newly announced blocks to the chain and the wallet.
//!
//! Full-node concerns (multi-peer sync, mempool admission, script execution
//! against a UTXO set, mining, on-disk storage) are out of scope; this binary
//! exists to exercise `btpc_core` against a real peer.

use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use btpc_core::{
    blockchain::{Block, BlockChain, ChainEvent, NetworkParams},
    crypto::Hash,
    network::{Peer, PeerEvent},
    wallet::{persist, BlockType, Wallet},
    wire::InvType,
    Network,
};
use clap::Parser;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "svp-node", about = "Simplified Payment Verification node")]
struct NodeConfig {
    /// Network parameter set to use.
    #[arg(long, default_value = "testnet")]
    network: Network,

    /// The single upstream peer this client connects to.
    #[arg(long)]
    peer: SocketAddr,

    /// Wallet file to load (created if it doesn't exist).
    #[arg(long, default_value = "wallet.dat")]
    wallet_file: PathBuf,

    /// Directory for any other node state (currently unused, reserved for
    /// a future on-disk chain cache).
    #[arg(long, default_value = ".svp")]
    datadir: PathBuf,

    /// Raise the tracing filter to debug.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::parse();

    let filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    std::fs::create_dir_all(&config.datadir).ok();

    let mut wallet = load_or_create_wallet(&config.wallet_file)?;
    info!(
        available = wallet.available_balance(),
        estimated = wallet.estimated_balance(),
        "wallet loaded"
    );

    let params = NetworkParams::for_network(config.network);
    let mut chain = BlockChain::new(params.clone());
    let mut block_cache: HashMap<Hash, Block> = HashMap::new();

    info!(peer = %config.peer, network = ?config.network, "connecting");
    let stream = TcpStream::connect(config.peer)
        .await
        .with_context(|| format!("connecting to {}", config.peer))?;

    let (peer, mut events) = Peer::connect(stream, params.magic_bytes, chain.height() as u32)
        .await
        .context("handshake failed")?;

    let latch = peer
        .start_block_chain_download(chain.store(), 1)
        .context("starting block-chain download")?;
    tokio::spawn(async move {
        if latch.await_zero(Duration::from_secs(300)).await {
            info!("initial block-chain download complete");
        } else {
            warn!("initial block-chain download timed out");
        }
    });

    let mut last_orphan: Option<Hash> = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !handle_event(event, &peer, &mut chain, &mut wallet, &mut block_cache, &mut last_orphan).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    peer.disconnect();
    std::fs::write(&config.wallet_file, persist::save(&wallet))
        .with_context(|| format!("saving wallet to {}", config.wallet_file.display()))?;
    info!(height = chain.height(), "stopped");
    Ok(())
}

/// Apply one peer event to the chain and wallet. Returns `false` if the
/// caller should stop the event loop (the peer disconnected).
async fn handle_event(
    event: PeerEvent,
    peer: &Peer,
    chain: &mut BlockChain,
    wallet: &mut Wallet,
    block_cache: &mut HashMap<Hash, Block>,
    last_orphan: &mut Option<Hash>,
) -> bool {
    match event {
        PeerEvent::Block(block) => {
            apply_block(block, chain, wallet, block_cache, peer, last_orphan);
        }
        PeerEvent::Inventory(items) => {
            let block_hashes: Vec<Hash> = items
                .iter()
                .filter(|item| item.inv_type == InvType::Block)
                .map(|item| item.hash)
                .collect();

            // A single re-announcement of the block we're already stuck
            // behind is a continue signal, not a new item to fetch: retry
            // the getblocks request rather than issuing a getdata for it.
            if block_hashes.len() == 1 && Some(block_hashes[0]) == *last_orphan {
                let hash = block_hashes[0];
                if let Err(err) = peer.request_blocks_up_to(chain.store(), hash) {
                    warn!(%err, %hash, "retrying catch-up request failed");
                }
                return true;
            }

            for item in items {
                if item.inv_type == InvType::Block && !chain.contains(&item.hash)
                {
                    match peer.get_block(item.hash, Duration::from_secs(30)).await {
                        Ok(block) => apply_block(block, chain, wallet, block_cache, peer, last_orphan),
                        Err(err) => warn!(%err, hash = %item.hash, "fetching announced block failed"),
                    }
                }
            }
        }
        PeerEvent::Transaction(tx) => {
            debug!(txid = %tx.txid(), "received unconfirmed transaction");
        }
        PeerEvent::Disconnected => {
            warn!("peer disconnected");
            return false;
        }
    }
    true
}

fn apply_block(
    block: Block,
    chain: &mut BlockChain,
    wallet: &mut Wallet,
    block_cache: &mut HashMap<Hash, Block>,
    peer: &Peer,
    last_orphan: &mut Option<Hash>,
) {
    let hash = block.hash();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    block_cache.insert(hash, block.clone());

    match chain.add(block.clone(), now) {
        Ok(ChainEvent::Connected(connected_hash)) => {
            for tx in &block.transactions {
                wallet.receive(tx.clone(), connected_hash, BlockType::BestChain);
            }
            info!(height = chain.height(), hash = %connected_hash, "connected");
            if *last_orphan == Some(connected_hash) {
                *last_orphan = None;
            }
        }
        Ok(ChainEvent::SideChain(side_hash)) => {
            for tx in &block.transactions {
                wallet.receive(tx.clone(), side_hash, BlockType::SideChain);
            }
            info!(hash = %side_hash, "connected to a side branch");
            if *last_orphan == Some(side_hash) {
                *last_orphan = None;
            }
        }
        Ok(ChainEvent::Reorganized(event)) => {
            let old_chain: Vec<Block> = event
                .disconnected
                .iter()
                .filter_map(|h| block_cache.get(h).cloned())
                .collect();
            let new_chain: Vec<Block> = event
                .connected
                .iter()
                .filter_map(|h| block_cache.get(h).cloned())
                .collect();
            wallet.reorganize(&old_chain, &new_chain);
            info!(height = chain.height(), fork_point = %event.fork_point, "reorganized");
            if *last_orphan == Some(hash) {
                *last_orphan = None;
            }
        }
        Ok(ChainEvent::Orphan) => {
            debug!(%hash, "buffered orphan block");
            *last_orphan = Some(hash);
            if let Err(err) = peer.request_blocks_up_to(chain.store(), hash) {
                warn!(%err, %hash, "requesting catch-up blocks failed");
            }
        }
        Ok(ChainEvent::Duplicate) => {}
        Err(err) => warn!(%err, %hash, "rejected block"),
    }
}

fn load_or_create_wallet(path: &PathBuf) -> Result<Wallet> {
    if path.exists() {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(persist::load(&bytes)?)
    } else {
        let mut wallet = Wallet::new();
        wallet.add_key(btpc_core::crypto::PrivateKey::generate());
        std::fs::write(path, persist::save(&wallet))
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(wallet)
    }
}
