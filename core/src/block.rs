//! Block model: header fields, canonical hashing, proof-of-work check.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub timestamp: f64,
}

impl Block {
    /// `chain[0]`: index 0, all-zero previous hash, no transactions,
    /// nonce 0, a fixed timestamp so every node derives the identical
    /// genesis block hash.
    pub fn genesis() -> Self {
        Block {
            index: 0,
            previous_hash: "0".repeat(64),
            transactions: Vec::new(),
            nonce: 0,
            timestamp: 0.0,
        }
    }

    /// Deterministic cryptographic hash over all five fields, rendered as
    /// a lowercase hex string.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        let canonical = serde_json::to_vec(self).expect("block always serializes");
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }

    /// A block is well-formed when its hash begins with `difficulty`
    /// leading hex-zero characters. `difficulty == 0` means any hash
    /// passes.
    pub fn is_well_formed(&self, difficulty: usize) -> bool {
        quorumchain_util::leading_hex_zeros(&self.hash()) >= difficulty
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn block_with_nonce(nonce: u64) -> Block {
        Block {
            index: 1,
            previous_hash: Block::genesis().hash(),
            transactions: vec![Transaction::coinbase("alice", 50, 1)],
            nonce,
            timestamp: 1.0,
        }
    }

    #[test]
    fn genesis_has_all_zero_previous_hash_and_no_transactions() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0".repeat(64));
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.nonce, 0);
    }

    #[test]
    fn zero_difficulty_accepts_any_hash() {
        assert!(block_with_nonce(0).is_well_formed(0));
    }

    #[test]
    fn nonzero_difficulty_rejects_hashes_with_too_few_leading_zeros() {
        let block = block_with_nonce(0);
        let actual_zeros = quorumchain_util::leading_hex_zeros(&block.hash());
        assert!(!block.is_well_formed(actual_zeros + 1));
        assert!(block.is_well_formed(actual_zeros));
    }

    #[test]
    fn hash_changes_with_nonce() {
        let a = block_with_nonce(0);
        let b = block_with_nonce(1);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn coinbase_returns_first_transaction_only_when_it_has_no_inputs() {
        let with_coinbase = block_with_nonce(0);
        assert!(with_coinbase.coinbase().is_some());

        let mut metadata = BTreeMap::new();
        metadata.insert("height".to_string(), serde_json::Value::from(1u64));
        let non_coinbase_first = Block {
            index: 1,
            previous_hash: Block::genesis().hash(),
            transactions: vec![Transaction::new(
                vec![crate::transaction::TxInput {
                    tx_id: "a".repeat(64),
                    index: 0,
                    signature: String::new(),
                    pubkey: String::new(),
                }],
                vec![],
                metadata,
            )],
            nonce: 0,
            timestamp: 1.0,
        };
        assert!(non_coinbase_first.coinbase().is_none());
    }
}
