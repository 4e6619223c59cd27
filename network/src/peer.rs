//! Peer set bookkeeping and the outbound broadcaster.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::RwLock;

use crate::message::{self, Message, MessageError};

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("I/O error talking to peer: {0}")]
    Io(#[from] std::io::Error),
    #[error("message encoding error: {0}")]
    Message(#[from] MessageError),
}

/// A peer's TCP endpoint. Comparison and ordering are by `(host, port)`,
/// which is exactly the ordering leader election needs over
/// `host:port` strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerHandle {
    pub host: String,
    pub port: u16,
}

impl PeerHandle {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        PeerHandle { host: host.into(), port }
    }

    /// The `host:port` string leader election compares lexicographically.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

/// The concurrent peer set. Reads from outside the dispatcher (for
/// broadcasting, or for UDP discovery registering a new endpoint) see a
/// best-effort snapshot, per the concurrency model.
#[derive(Debug, Clone, Default)]
pub struct PeerSet {
    inner: Arc<RwLock<HashSet<PeerHandle>>>,
}

impl PeerSet {
    pub fn new() -> Self {
        PeerSet { inner: Arc::new(RwLock::new(HashSet::new())) }
    }

    /// Seeds the set from a peer list known at startup (CLI-supplied
    /// peer seeds), before any async task has had a chance to run.
    pub fn with_peers(peers: impl IntoIterator<Item = PeerHandle>) -> Self {
        PeerSet { inner: Arc::new(RwLock::new(peers.into_iter().collect())) }
    }

    pub async fn insert(&self, peer: PeerHandle) -> bool {
        self.inner.write().await.insert(peer)
    }

    /// `DISCONNECT(host, port)` removes the sender from `peers`. Returns
    /// whether the peer was a member (an absent peer is `UnknownPeer`,
    /// which callers treat as a no-op, not an error).
    pub async fn remove(&self, peer: &PeerHandle) -> bool {
        self.inner.write().await.remove(peer)
    }

    pub async fn snapshot(&self) -> Vec<PeerHandle> {
        self.inner.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Peer-to-peer delivery, the transport external collaborator named in
/// the component table. `broadcast` never removes a peer on send
/// failure — discovery is left to reconcile the set over time.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn send_to(&self, peer: &PeerHandle, message: &Message) -> Result<(), PeerError>;

    async fn broadcast(&self, peers: &[PeerHandle], message: &Message) {
        for peer in peers {
            if let Err(e) = self.send_to(peer, message).await {
                log::warn!("broadcast to {} failed: {}", peer, e);
            }
        }
    }
}

/// Opens a fresh connection per peer per message, writes the encoded
/// JSON body, and shuts down the write half so the remote reader's
/// "accumulate until the peer closes its send half" framing terminates
/// cleanly. One connection per message, matching the wire format's "one
/// message per connection" contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpBroadcaster;

#[async_trait]
impl Broadcaster for TcpBroadcaster {
    async fn send_to(&self, peer: &PeerHandle, message: &Message) -> Result<(), PeerError> {
        let encoded = message::encode(message)?;
        let mut stream = TcpStream::connect(peer.endpoint()).await?;
        stream.write_all(encoded.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn peer_set_insert_and_remove() {
        let peers = PeerSet::new();
        let peer = PeerHandle::new("10.0.0.1", 9001);
        assert!(peers.insert(peer.clone()).await);
        assert_eq!(peers.len().await, 1);
        assert!(peers.remove(&peer).await);
        assert!(peers.is_empty().await);
    }

    #[test]
    fn endpoint_renders_as_host_colon_port() {
        let peer = PeerHandle::new("192.168.0.2", 9000);
        assert_eq!(peer.endpoint(), "192.168.0.2:9000");
    }

    #[test]
    fn peer_handles_order_lexicographically_by_endpoint() {
        let a = PeerHandle::new("10.0.0.1", 9000);
        let b = PeerHandle::new("10.0.0.2", 9000);
        assert!(a < b);
    }
}
