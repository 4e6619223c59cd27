//! Message codec, peer set and the transport/discovery collaborators.

pub mod discovery;
pub mod message;
pub mod peer;
pub mod transport;

pub use discovery::{spawn_broadcaster, spawn_discovery, DiscoveryError, DISCOVERY_PORT};
pub use message::{decode, encode, ChainData, DisconnectData, Message, MessageError, RebroadcastData};
pub use peer::{Broadcaster, PeerError, PeerHandle, PeerSet, TcpBroadcaster};
pub use transport::{spawn_listener, Inbound, TransportError};

use thiserror::Error;

/// Aggregate error type for callers that want a single `?`-friendly
/// error across the codec, peer and transport modules.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
