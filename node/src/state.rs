//! Node state: stage, peer set, pending-block votes, role and identity.
//!
//! Mirrors the `(stage, peers, pending_blocks, role, self_address,
//! self_endpoint)` tuple from the component design. `peers` is the
//! genuinely concurrent piece (backed by [`PeerSet`]); `stage` and
//! `pending_blocks` are dispatcher-owned but kept behind `RwLock` so a
//! test harness can inspect them from outside the dispatcher loop, per
//! the `stage_lock`/`block_lock` discipline in the concurrency model.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use quorumchain_consensus::Constants;
use quorumchain_core::{Block, Blockchain};
use quorumchain_network::{Broadcaster, DisconnectData, Inbound, Message, PeerHandle, PeerSet};

/// Whether this node attempts to produce blocks when it is elected
/// leader. A `User` node still participates in leader election and
/// still broadcasts `MINING` when elected; only its own `MINING`
/// handler is a no-op (see the design notes on the USER-leader round).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Miner,
    User,
}

/// `Tx` accepts new transactions and awaits the next round's start;
/// `Mining` means a block proposal is in flight for this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tx,
    Mining,
}

#[derive(Debug, Clone)]
struct PendingBlock {
    block: Block,
    votes: u32,
}

/// Everything read once at startup from the CLI and passed explicitly
/// through the constructor — never process-wide mutable settings.
pub struct NodeConfig {
    pub self_endpoint: PeerHandle,
    pub self_address: String,
    pub role: Role,
    pub initial_peers: Vec<PeerHandle>,
    pub constants: Constants,
}

/// The node state machine. All ledger state and `pending_blocks` are
/// dispatcher-owned: only [`crate::dispatch::run`]'s handler writes to
/// them. Other workers (discovery, the mining timer, tests) read a
/// best-effort snapshot.
pub struct Node {
    pub blockchain: RwLock<Blockchain>,
    pub peers: PeerSet,
    pending_blocks: RwLock<HashMap<String, PendingBlock>>,
    stage: RwLock<Stage>,
    pub role: Role,
    pub self_address: String,
    pub self_endpoint: PeerHandle,
    pub constants: Constants,
    broadcaster: Arc<dyn Broadcaster>,
    queue_tx: mpsc::Sender<Inbound>,
}

impl Node {
    /// Builds the node and its dispatcher queue. Hand the returned
    /// receiver to [`crate::dispatch::run`]; the returned sender is
    /// what the transport listener and the discovery reactor feed
    /// inbound messages into (and what the node uses to enqueue
    /// messages to itself).
    pub fn new(config: NodeConfig, broadcaster: Arc<dyn Broadcaster>) -> (Arc<Node>, mpsc::Receiver<Inbound>, mpsc::Sender<Inbound>) {
        let (queue_tx, queue_rx) = mpsc::channel(1024);
        let node = Arc::new(Node {
            blockchain: RwLock::new(Blockchain::new(config.constants)),
            peers: PeerSet::with_peers(config.initial_peers),
            pending_blocks: RwLock::new(HashMap::new()),
            stage: RwLock::new(Stage::Tx),
            role: config.role,
            self_address: config.self_address,
            self_endpoint: config.self_endpoint,
            constants: config.constants,
            broadcaster,
            queue_tx: queue_tx.clone(),
        });
        let sender = node.queue_tx.clone();
        (node, queue_rx, sender)
    }

    pub async fn stage(&self) -> Stage {
        *self.stage.read().await
    }

    pub(crate) async fn set_stage(&self, stage: Stage) {
        *self.stage.write().await = stage;
    }

    pub(crate) fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }

    /// Enqueues `message` onto this node's own dispatcher queue, as if
    /// it had arrived over the wire from nobody in particular. Used for
    /// every "also enqueue it locally" step in the round loop.
    pub(crate) async fn enqueue_local(&self, message: Message) {
        if self.queue_tx.send((None, message)).await.is_err() {
            log::warn!("dispatcher queue closed, dropping locally-enqueued message");
        }
    }

    /// First vote for a block hash sets the count to one; later votes
    /// for the same hash increment it. Mirrors the source's
    /// `_register_pending_block`.
    pub(crate) async fn register_pending_block(&self, block: Block) {
        let hash = block.hash();
        let mut pending = self.pending_blocks.write().await;
        pending.entry(hash).and_modify(|p| p.votes += 1).or_insert(PendingBlock { block, votes: 1 });
    }

    pub(crate) async fn clear_pending_blocks(&self) {
        self.pending_blocks.write().await.clear();
    }

    /// The highest-voted candidate this round, and its vote count, if
    /// any block has been registered.
    pub(crate) async fn best_pending_block(&self) -> Option<(Block, u32)> {
        self.pending_blocks.read().await.values().max_by_key(|p| p.votes).map(|p| (p.block.clone(), p.votes))
    }

    /// Vote count for a specific block hash. Exposed for tests that
    /// want to check the quorum state from outside the dispatcher, per
    /// the concurrency model's note that `pending_blocks` "may be
    /// inspected from non-dispatcher paths in tests".
    pub async fn votes_for(&self, block_hash: &str) -> u32 {
        self.pending_blocks.read().await.get(block_hash).map(|p| p.votes).unwrap_or(0)
    }

    /// Announces this node's departure by broadcasting `DISCONNECT` for
    /// its own endpoint to every known peer. The only in-band shutdown
    /// signal the protocol defines; callers still tear down their own
    /// tasks afterward, this just tells everyone else to drop us.
    pub async fn disconnect(&self) {
        let peers = self.peers.snapshot().await;
        let message = Message::Disconnect(DisconnectData {
            host: self.self_endpoint.host.clone(),
            port: self.self_endpoint.port,
        });
        self.broadcaster().broadcast(&peers, &message).await;
    }
}
