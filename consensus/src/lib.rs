//! Round tunables and consensus-level error kinds.
//!
//! This crate is deliberately thin: it carries no ledger types and no
//! proof-of-work implementation of its own (that lives on `Block`, where
//! the hash it checks is computed). It exists so the three knobs that
//! govern a round — how long a node sleeps between rounds, what a miner
//! is paid, and how hard a block must be to find — are a single value
//! passed explicitly through constructors, never a global default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Round tunables, read once at startup and threaded through every
/// constructor that needs them. Never stored as process-wide mutable
/// state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constants {
    /// Seconds a node sleeps between the end of one round and the leader
    /// broadcasting the next `MINING` message.
    pub time_to_sleep: u64,
    /// Amount paid to a miner's address by the coinbase transaction of a
    /// block it mines.
    pub miner_reward: u64,
    /// Number of leading hex-zero characters a block hash must exhibit to
    /// be well-formed.
    pub difficulty: usize,
}

impl Default for Constants {
    fn default() -> Self {
        Constants {
            time_to_sleep: 60,
            miner_reward: 50,
            difficulty: 3,
        }
    }
}

/// Errors surfaced by the consensus layer that are not ledger validation
/// failures (those live in `quorumchain_core`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// A leader-only action (quorum commit, mining-round broadcast) was
    /// invoked by a node that is not the current leader. Not an error
    /// condition the caller should propagate — callers skip the path
    /// instead of logging this.
    #[error("node is not the current leader")]
    NotLeader,

    /// `disconnect` named a peer that was not a member of the peer set.
    #[error("peer {0} is not a known peer")]
    UnknownPeer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_tunables() {
        let c = Constants::default();
        assert_eq!(c.time_to_sleep, 60);
        assert_eq!(c.miner_reward, 50);
        assert_eq!(c.difficulty, 3);
    }
}
