//! Network layer: the asynchronous single-peer protocol state machine.
//!
//! Transport (TCP) and peer discovery (DNS seeds) are external collaborators
//! with a stated interface, not implemented here; a `Peer` is constructed
//! from anything that implements `AsyncRead + AsyncWrite`.

pub mod peer;

pub use peer::{Peer, PeerError, PeerEvent, PeerState};

use thiserror::Error;

/// Errors surfaced by peer construction and the handshake, distinct from
/// per-request `PeerError`s raised once a peer is already running.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("peer error: {0}")]
    Peer(#[from] PeerError),
    #[error("wire error: {0}")]
    Wire(#[from] crate::wire::WireError),
}
