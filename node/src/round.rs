//! The one-shot mining timer and the discovery-driven chain-sync
//! reactor: the two background workers that feed messages into the
//! dispatcher from outside the wire itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use quorumchain_network::{Message, PeerHandle};

use crate::leader::is_leader;
use crate::state::{Node, Role};

/// Sleeps `constants.time_to_sleep` seconds, then — if this node is
/// currently the leader — broadcasts `MINING` to its peers and, if it
/// mines itself, enqueues a local copy. A fresh timer is spawned after
/// every commit, per the round loop.
pub fn spawn_round_timer(node: Arc<Node>) {
    tokio::spawn(async move {
        time::sleep(Duration::from_secs(node.constants.time_to_sleep)).await;
        let peers = node.peers.snapshot().await;
        if is_leader(&node.self_endpoint, &peers) {
            node.broadcaster().broadcast(&peers, &Message::Mining).await;
            if node.role == Role::Miner {
                node.enqueue_local(Message::Mining).await;
            }
        } else {
            log::trace!("round timer fired on a non-leader node; nothing to broadcast");
        }
    });
}

/// Consumes newly discovered peers and issues `REQUEST_CHAIN` whenever
/// this node's chain is still genesis-only, matching the source's
/// reaction to freshly seen peers during presence broadcasting.
pub fn spawn_discovery_reactor(node: Arc<Node>, mut discovered: mpsc::Receiver<PeerHandle>) {
    tokio::spawn(async move {
        while let Some(peer) = discovered.recv().await {
            let chain_len = node.blockchain.read().await.chain.len();
            if chain_len == 1 {
                log::info!("chain is genesis-only, requesting sync after discovering {}", peer);
                let peers = node.peers.snapshot().await;
                node.broadcaster().broadcast(&peers, &Message::RequestChain).await;
            }
        }
    });
}
