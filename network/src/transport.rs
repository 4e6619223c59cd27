//! TCP transport listener: the parallel worker named in the concurrency
//! model. It never mutates ledger or node state directly — it only
//! parses bytes into a [`Message`] and hands it to whatever channel the
//! caller gave it.

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::message::{self, Message, MessageError};
use crate::peer::PeerHandle;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An inbound message paired with the endpoint it was read from, when
/// known (a freshly accepted connection's remote address).
pub type Inbound = (Option<PeerHandle>, Message);

/// Binds `bind_addr` and spawns a background task that accepts
/// connections forever, reading one complete message per connection
/// (the peer's send-half close delimits it) and forwarding decoded
/// messages to `inbound`. Decode failures are logged and discarded, per
/// the decode error policy — they never reach `inbound`.
pub async fn spawn_listener(
    bind_addr: &str,
    inbound: mpsc::Sender<Inbound>,
) -> Result<tokio::task::JoinHandle<()>, TransportError> {
    let listener = TcpListener::bind(bind_addr).await?;
    log::info!("listening for peer connections on {}", bind_addr);

    let handle = tokio::spawn(async move {
        loop {
            let (mut stream, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    continue;
                }
            };
            let inbound = inbound.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stream.read_to_end(&mut buf).await {
                    log::warn!("read from {} failed: {}", remote, e);
                    return;
                }
                let text = match std::str::from_utf8(&buf) {
                    Ok(t) => t,
                    Err(e) => {
                        log::warn!("non-utf8 message from {}: {}", remote, e);
                        return;
                    }
                };
                match message::decode(text) {
                    Ok(msg) => {
                        let peer = Some(PeerHandle::new(remote.ip().to_string(), remote.port()));
                        if inbound.send((peer, msg)).await.is_err() {
                            log::warn!("inbound message queue closed, dropping message from {}", remote);
                        }
                    }
                    Err(MessageError::Decode(e)) => {
                        log::debug!("discarding malformed message from {}: {}", remote, e);
                    }
                }
            });
        }
    });

    Ok(handle)
}
