//! UDP broadcast discovery: the parallel worker that maintains `peers`.
//!
//! Two independent roles, each on its own socket, mirroring the
//! original's `_listen_discovery` / `_broadcast_presence` split:
//! [`spawn_discovery`] only answers incoming `DISCOVER` probes with this
//! node's own endpoint; [`spawn_broadcaster`] is the one that actually
//! grows `peers` — it sends the probe and then reads the replies off the
//! *same* socket it sent from, since a reply to an ephemeral-port probe
//! can only ever land back on that port.

use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time;

use crate::peer::{PeerHandle, PeerSet};

pub const DISCOVERY_PORT: u16 = 9000;
const PROBE: &[u8] = b"DISCOVER";
const PERIOD: Duration = Duration::from_secs(5);
const REPLY_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Binds the fixed discovery port and spawns a task that answers every
/// incoming `DISCOVER` probe with this node's own `host:port`. Never
/// touches `peers` itself — replies to probes land on the prober's
/// ephemeral socket, which [`spawn_broadcaster`] reads.
pub async fn spawn_discovery(self_endpoint: PeerHandle) -> Result<tokio::task::JoinHandle<()>, DiscoveryError> {
    let socket = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT)).await?;

    let handle = tokio::spawn(async move {
        let mut buf = [0u8; 256];
        loop {
            let (len, src) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    log::warn!("discovery recv failed: {}", e);
                    continue;
                }
            };

            if &buf[..len] == PROBE {
                let reply = self_endpoint.endpoint();
                if let Err(e) = socket.send_to(reply.as_bytes(), src).await {
                    log::warn!("discovery reply to {} failed: {}", src, e);
                }
            }
        }
    });

    Ok(handle)
}

/// Periodically broadcasts the `DISCOVER` probe on the local subnet from
/// a single socket, then drains that same socket for a short window
/// collecting replies before sleeping until the next period. Newly seen
/// endpoints are folded into `peers` and pushed onto `discovered`, so a
/// node whose chain is genesis-only can react by issuing
/// `REQUEST_CHAIN`.
pub async fn spawn_broadcaster(
    self_endpoint: PeerHandle,
    peers: PeerSet,
    discovered: mpsc::Sender<PeerHandle>,
    broadcast_addr: &str,
) -> Result<tokio::task::JoinHandle<()>, DiscoveryError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    let target = format!("{}:{}", broadcast_addr, DISCOVERY_PORT);

    let handle = tokio::spawn(async move {
        let mut interval = time::interval(PERIOD);
        let mut buf = [0u8; 256];
        loop {
            interval.tick().await;
            if let Err(e) = socket.send_to(PROBE, &target).await {
                log::warn!("discovery probe to {} failed: {}", target, e);
                continue;
            }

            loop {
                let received = time::timeout(REPLY_WINDOW, socket.recv_from(&mut buf)).await;
                let (len, _src) = match received {
                    Ok(Ok(received)) => received,
                    Ok(Err(e)) => {
                        log::warn!("discovery reply recv failed: {}", e);
                        break;
                    }
                    Err(_elapsed) => break,
                };

                let Ok(text) = std::str::from_utf8(&buf[..len]) else { continue };
                let Some((host, port)) = text.rsplit_once(':') else { continue };
                let Ok(port) = port.parse::<u16>() else { continue };
                let candidate = PeerHandle::new(host, port);

                if candidate == self_endpoint {
                    continue;
                }
                if peers.insert(candidate.clone()).await {
                    log::info!("discovered peer {}", candidate);
                    if discovered.send(candidate).await.is_err() {
                        log::debug!("discovery event channel closed");
                    }
                }
            }
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_the_literal_ascii_bytes_discover() {
        assert_eq!(PROBE, b"DISCOVER");
    }

    #[test]
    fn reply_parsing_splits_on_last_colon() {
        let text = "2001:db8::1:9000";
        let (host, port) = text.rsplit_once(':').unwrap();
        assert_eq!(host, "2001:db8::1");
        assert_eq!(port, "9000");
    }
}
