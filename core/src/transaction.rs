//! Transaction model: inputs, outputs, metadata, canonical hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A single spendable output: an amount paid to an address. Immutable
/// once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: String,
}

/// A reference to a prior output, plus the signature authorizing its
/// spend. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_id: String,
    pub index: u32,
    pub signature: String,
    pub pubkey: String,
}

/// `metadata` uses a `BTreeMap` rather than a `HashMap` so the canonical
/// hash has a single deterministic serialization regardless of insertion
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Transaction {
    pub fn new(
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Transaction { inputs, outputs, metadata }
    }

    /// A coinbase transaction has exactly zero inputs.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Builds the coinbase transaction `mine_block` mints: a single
    /// output paying `reward` to `miner_address`, with `metadata.height`
    /// set so the hash stays unique across rounds even when the reward
    /// and address don't change.
    pub fn coinbase(miner_address: &str, reward: u64, height: u64) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("height".to_string(), serde_json::Value::from(height));
        Transaction {
            inputs: Vec::new(),
            outputs: vec![TxOutput { amount: reward, address: miner_address.to_string() }],
            metadata,
        }
    }

    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Deterministic cryptographic hash over inputs, outputs, and
    /// metadata, rendered as a lowercase 64-hex-character string. Field
    /// order is fixed because `metadata` is a `BTreeMap` and `inputs`/
    /// `outputs` are serialized in their stored (ordered) sequence.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        // serde_json on a struct with ordered Vec fields and a BTreeMap
        // field serializes deterministically: this is the canonical
        // encoding the hash is taken over.
        let canonical = serde_json::to_vec(self).expect("transaction always serializes");
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output(amount: u64, address: &str) -> TxOutput {
        TxOutput { amount, address: address.to_string() }
    }

    #[test]
    fn coinbase_has_no_inputs() {
        let tx = Transaction::coinbase("alice", 50, 1);
        assert!(tx.is_coinbase());
        assert_eq!(tx.output_total(), 50);
    }

    #[test]
    fn non_coinbase_has_inputs() {
        let tx = Transaction::new(
            vec![TxInput { tx_id: "a".repeat(64), index: 0, signature: String::new(), pubkey: String::new() }],
            vec![sample_output(10, "bob")],
            BTreeMap::new(),
        );
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn hash_is_deterministic_and_sensitive_to_contents() {
        let a = Transaction::coinbase("alice", 50, 1);
        let b = Transaction::coinbase("alice", 50, 1);
        let c = Transaction::coinbase("alice", 50, 2);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn hash_is_a_64_char_lowercase_hex_string() {
        let tx = Transaction::coinbase("alice", 50, 1);
        let h = tx.hash();
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn coinbase_height_guarantees_hash_uniqueness_across_rounds() {
        let round1 = Transaction::coinbase("alice", 50, 1);
        let round2 = Transaction::coinbase("alice", 50, 2);
        assert_ne!(round1.hash(), round2.hash());
    }
}
