//! The asynchronous single-peer protocol state machine.
//!
//! A `Peer` wraps one already-connected duplex stream (TCP, a test pipe,
//! whatever implements `AsyncRead + AsyncWrite`). It performs the
//! version/verack handshake, then spawns a reader task that decodes
//! messages off the wire and either resolves a pending single-block fetch,
//! forwards an event to the caller, or counts a block off the active
//! block-chain-download latch. Connection lifecycle and DNS/TCP dialing are
//! the caller's job; this type never opens a socket itself.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf},
    sync::{mpsc, oneshot, Notify},
    task::JoinHandle,
};

use crate::{
    blockchain::store::BlockStore,
    crypto::Hash,
    util::CountdownLatch,
    wire::{
        message::{GetBlocksMessage, InvType, InventoryVector, ServiceFlags, VersionMessage},
        FramedTransport, Message, WireError,
    },
    PROTOCOL_VERSION,
};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const SHUTTING_DOWN: u8 = 2;
const STOPPED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

impl PeerState {
    fn from_code(code: u8) -> Self {
        match code {
            CREATED => PeerState::Created,
            RUNNING => PeerState::Running,
            SHUTTING_DOWN => PeerState::ShuttingDown,
            _ => PeerState::Stopped,
        }
    }
}

/// Inbound events the caller did not itself ask for: inventory
/// announcements, relayed transactions, and unsolicited blocks.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    Inventory(Vec<InventoryVector>),
    Transaction(crate::blockchain::Transaction),
    Block(crate::blockchain::Block),
    Disconnected,
}

/// A connected peer. Cloning shares the same underlying connection; the
/// reader task and writer channel live only as long as one `Peer` handle
/// does, but clones keep it alive (`Arc` internally).
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    state: AtomicU8,
    outbound: mpsc::UnboundedSender<Message>,
    pending_blocks: Mutex<HashMap<Hash, oneshot::Sender<crate::blockchain::Block>>>,
    download_latch: Mutex<Option<Arc<CountdownLatch>>>,
    shutdown: Notify,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Peer {
    /// Perform the version/verack handshake over `stream` and spawn the
    /// reader/writer tasks. `events` receives anything not claimed by a
    /// pending `get_block` future or the active download latch.
    pub async fn connect<S>(
        stream: S,
        magic: [u8; 4],
        start_height: u32,
    ) -> Result<(Peer, mpsc::UnboundedReceiver<PeerEvent>), PeerError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let transport = Arc::new(FramedTransport::new(magic));
        let (mut read_half, mut write_half) = split(stream);

        let version = VersionMessage::new(
            ServiceFlags::NONE,
            Default::default(),
            Default::default(),
            format!("/svp:{}/", crate::VERSION),
            start_height,
            true,
            unix_time(),
            rand::random(),
        );
        transport
            .write_message(&mut write_half, &Message::Version(version))
            .await?;

        let mut got_version = false;
        let mut got_verack = false;
        while !(got_version && got_verack) {
            match transport.read_message(&mut read_half).await? {
                Message::Version(_) => {
                    got_version = true;
                    transport
                        .write_message(&mut write_half, &Message::VerAck)
                        .await?;
                }
                Message::VerAck => got_verack = true,
                _ => return Err(PeerError::HandshakeFailed),
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(PeerInner {
            state: AtomicU8::new(RUNNING),
            outbound: outbound_tx,
            pending_blocks: Mutex::new(HashMap::new()),
            download_latch: Mutex::new(None),
            shutdown: Notify::new(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        });

        let writer_handle = spawn_writer(transport.clone(), write_half, outbound_rx);
        let reader_handle = spawn_reader(transport, read_half, inner.clone(), events_tx);

        *inner.writer.lock().unwrap() = Some(writer_handle);
        *inner.reader.lock().unwrap() = Some(reader_handle);

        Ok((Peer { inner }, events_rx))
    }

    pub fn state(&self) -> PeerState {
        PeerState::from_code(self.inner.state.load(Ordering::SeqCst))
    }

    /// Fetch exactly one block by hash. The pending entry is registered
    /// before the request is sent, so a reply racing the registration can
    /// never be missed.
    pub async fn get_block(
        &self,
        hash: Hash,
        timeout: Duration,
    ) -> Result<crate::blockchain::Block, PeerError> {
        if self.state() != PeerState::Running {
            return Err(PeerError::NotRunning);
        }

        let (tx, rx) = oneshot::channel();
        self.inner.pending_blocks.lock().unwrap().insert(hash, tx);

        let request = Message::GetData(vec![InventoryVector {
            inv_type: InvType::Block,
            hash,
        }]);
        if self.inner.outbound.send(request).is_err() {
            self.inner.pending_blocks.lock().unwrap().remove(&hash);
            return Err(PeerError::NotRunning);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(block)) => Ok(block),
            Ok(Err(_)) => Err(PeerError::Disconnected),
            Err(_) => {
                self.inner.pending_blocks.lock().unwrap().remove(&hash);
                Err(PeerError::Timeout)
            }
        }
    }

    /// Send `getblocks` built from the store's locator and return a latch
    /// that counts down to zero as blocks connect. `expected_blocks` is the
    /// caller's estimate of the height gap (e.g. from the peer's reported
    /// `start_height`); the latch tolerates undercounting.
    pub fn start_block_chain_download(
        &self,
        store: &BlockStore,
        expected_blocks: u32,
    ) -> Result<Arc<CountdownLatch>, PeerError> {
        let latch = Arc::new(CountdownLatch::new(expected_blocks));
        *self.inner.download_latch.lock().unwrap() = Some(latch.clone());
        self.send_get_blocks(store, Hash::zero())?;
        Ok(latch)
    }

    /// Progress catch-up past a block the chain engine could not connect:
    /// send `getblocks` anchored on what the store already has, with
    /// `stop_hash` set to the orphan so the peer fills exactly the gap
    /// between them. Also used to retry a stalled request when the peer
    /// re-announces the same orphan as a "continue" signal.
    pub fn request_blocks_up_to(&self, store: &BlockStore, stop_hash: Hash) -> Result<(), PeerError> {
        self.send_get_blocks(store, stop_hash)
    }

    fn send_get_blocks(&self, store: &BlockStore, stop_hash: Hash) -> Result<(), PeerError> {
        if self.state() != PeerState::Running {
            return Err(PeerError::NotRunning);
        }

        let request = Message::GetBlocks(GetBlocksMessage {
            version: PROTOCOL_VERSION,
            locator_hashes: build_block_locator(store),
            stop_hash,
        });
        self.inner
            .outbound
            .send(request)
            .map_err(|_| PeerError::NotRunning)
    }

    /// Disconnect: stop accepting new requests and tear down the reader and
    /// writer tasks. Idempotent.
    pub fn disconnect(&self) {
        let previous = self.inner.state.swap(SHUTTING_DOWN, Ordering::SeqCst);
        if previous == STOPPED || previous == SHUTTING_DOWN {
            self.inner.state.store(previous, Ordering::SeqCst);
            return;
        }
        self.inner.shutdown.notify_waiters();
        if let Some(handle) = self.inner.reader.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.writer.lock().unwrap().take() {
            handle.abort();
        }
        self.inner.state.store(STOPPED, Ordering::SeqCst);
    }
}

fn spawn_writer<W>(
    transport: Arc<FramedTransport>,
    mut write_half: WriteHalf<W>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if transport.write_message(&mut write_half, &message).await.is_err() {
                break;
            }
        }
    })
}

fn spawn_reader<R>(
    transport: Arc<FramedTransport>,
    mut read_half: ReadHalf<R>,
    inner: Arc<PeerInner>,
    events: mpsc::UnboundedSender<PeerEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match transport.read_message(&mut read_half).await {
                Ok(Message::Block(block)) => {
                    let hash = block.hash();
                    let pending = inner.pending_blocks.lock().unwrap().remove(&hash);
                    if let Some(sender) = pending {
                        let _ = sender.send(block);
                    } else {
                        if let Some(latch) = inner.download_latch.lock().unwrap().as_ref() {
                            latch.countdown();
                        }
                        let _ = events.send(PeerEvent::Block(block));
                    }
                }
                Ok(Message::Tx(tx)) => {
                    let _ = events.send(PeerEvent::Transaction(tx));
                }
                Ok(Message::Inv(items)) => {
                    let _ = events.send(PeerEvent::Inventory(items));
                }
                Ok(Message::NotFound(_)) | Ok(Message::GetAddr) | Ok(Message::Addr(_)) => {}
                Ok(Message::Version(_)) | Ok(Message::VerAck) | Ok(Message::GetData(_))
                | Ok(Message::GetBlocks(_)) => {}
                Err(_) => break,
            }

            if inner.state.load(Ordering::SeqCst) != RUNNING {
                break;
            }
        }
        inner.state.store(STOPPED, Ordering::SeqCst);
        let _ = events.send(PeerEvent::Disconnected);
    })
}

/// Build a block locator by walking back from the chain head with
/// exponentially increasing steps: the first ten entries are consecutive,
/// then the step doubles each time, ending at genesis. Lets a peer find the
/// common ancestor in O(log n) round trips instead of O(n).
pub fn build_block_locator(store: &BlockStore) -> Vec<Hash> {
    let mut locator = Vec::new();
    let mut step: u64 = 1;
    let mut height = store.height();
    let head = store.chain_head().hash();
    let mut cursor = head;

    loop {
        locator.push(cursor);
        if height == 0 {
            break;
        }
        if locator.len() > 10 {
            step *= 2;
        }
        let back = step.min(height);
        height -= back;
        let ancestors = store.ancestors(&cursor, (back + 1) as usize);
        match ancestors.last() {
            Some(block) => cursor = block.hash(),
            None => break,
        }
        if locator.len() >= 500 {
            break;
        }
    }

    locator
}

fn unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("handshake failed")]
    HandshakeFailed,
    #[error("peer is not running")]
    NotRunning,
    #[error("peer disconnected before the request completed")]
    Disconnected,
    #[error("request timed out")]
    Timeout,
    #[error(transparent)]
    Wire(#[from] WireError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockHeader, NetworkParams};

    #[tokio::test]
    async fn handshake_completes_over_a_duplex_pipe() {
        let (client, server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            let transport = FramedTransport::new([0xAA, 0xBB, 0xCC, 0xDD]);
            let (mut r, mut w) = split(server);
            match transport.read_message(&mut r).await.unwrap() {
                Message::Version(_) => {}
                _ => panic!("expected version"),
            }
            transport
                .write_message(&mut w, &Message::Version(VersionMessage::new(
                    ServiceFlags::NONE,
                    Default::default(),
                    Default::default(),
                    "/server/".to_string(),
                    0,
                    true,
                    0,
                    1,
                )))
                .await
                .unwrap();
            transport.write_message(&mut w, &Message::VerAck).await.unwrap();
            match transport.read_message(&mut r).await.unwrap() {
                Message::VerAck => {}
                _ => panic!("expected verack"),
            }
        });

        let (peer, _events) = Peer::connect(client, [0xAA, 0xBB, 0xCC, 0xDD], 0)
            .await
            .unwrap();
        assert_eq!(peer.state(), PeerState::Running);
        server_task.await.unwrap();
        peer.disconnect();
        assert_eq!(peer.state(), PeerState::Stopped);
    }

    #[tokio::test]
    async fn request_blocks_up_to_sends_getblocks_with_the_given_stop_hash() {
        let (client, server) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(async move {
            let transport = FramedTransport::new([0xAA, 0xBB, 0xCC, 0xDD]);
            let (mut r, mut w) = split(server);
            transport.read_message(&mut r).await.unwrap();
            transport
                .write_message(&mut w, &Message::Version(VersionMessage::new(
                    ServiceFlags::NONE,
                    Default::default(),
                    Default::default(),
                    "/server/".to_string(),
                    0,
                    true,
                    0,
                    1,
                )))
                .await
                .unwrap();
            transport.write_message(&mut w, &Message::VerAck).await.unwrap();
            transport.read_message(&mut r).await.unwrap();

            match transport.read_message(&mut r).await.unwrap() {
                Message::GetBlocks(msg) => msg,
                other => panic!("expected getblocks, got {other:?}"),
            }
        });

        let (peer, _events) = Peer::connect(client, [0xAA, 0xBB, 0xCC, 0xDD], 0)
            .await
            .unwrap();

        let params = NetworkParams::unit_tests();
        let store = BlockStore::new(&params);
        let orphan_hash = Hash::double_sha256(b"orphan");
        peer.request_blocks_up_to(&store, orphan_hash).unwrap();

        let getblocks = server_task.await.unwrap();
        assert_eq!(getblocks.stop_hash, orphan_hash);
        assert_eq!(getblocks.locator_hashes[0], store.chain_head().hash());
        peer.disconnect();
    }

    #[test]
    fn locator_includes_genesis_for_a_short_chain() {
        let params = NetworkParams::unit_tests();
        let mut store = BlockStore::new(&params);
        let genesis = store.chain_head().clone();
        let header = BlockHeader::new(
            1,
            genesis.hash(),
            Hash::double_sha256(b"m"),
            genesis.header.time + 600,
            genesis.header.bits,
            1,
        );
        let stored = crate::blockchain::store::StoredBlock::build(&genesis, header);
        let tip = stored.hash();
        store.put(stored).unwrap();
        store.set_chain_head(tip).unwrap();

        let locator = build_block_locator(&store);
        assert_eq!(locator[0], tip);
        assert_eq!(*locator.last().unwrap(), genesis.hash());
    }
}
