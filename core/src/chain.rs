//! The ledger: UTXO set, chain, validation, mining, balance queries.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use quorumchain_consensus::Constants;

use crate::block::Block;
use crate::transaction::Transaction;
use crate::utxo::UtxoSet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    #[error("transaction hash {0} already appears in pending or committed transactions")]
    DuplicateHash(String),
    #[error("coinbase transaction must have exactly one output equal to the miner reward")]
    InvalidCoinbaseReward,
    #[error("transaction spends the same output twice")]
    DoubleSpendWithinTransaction,
    #[error("input ({0}, {1}) is already spent by another pending transaction")]
    DoubleSpendPending(String, u32),
    #[error("input ({0}, {1}) does not reference a spendable output")]
    MissingUtxo(String, u32),
    #[error("pubkey does not decode to a valid address")]
    InvalidPubkey,
    #[error("pubkey's derived address does not match the referenced output's address")]
    AddressMismatch,
    #[error("signature does not verify against pubkey and tx_id||index")]
    BadSignature,
    #[error("sum of input amounts is less than sum of output amounts")]
    Overspend,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockValidationError {
    #[error("chain has no tip to extend")]
    EmptyPrefix,
    #[error("block hash does not meet the required difficulty")]
    NotWellFormed,
    #[error("expected block index {expected}, got {actual}")]
    WrongIndex { expected: u64, actual: u64 },
    #[error("block's previous_hash does not match the tip of the chain")]
    WrongPreviousHash,
    #[error("block has no transactions")]
    MissingCoinbase,
    #[error("only the first transaction in a block may be coinbase")]
    UnexpectedCoinbase,
    #[error(transparent)]
    Transaction(#[from] TransactionValidationError),
}

fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs_f64()
}

/// Validates `tx` against `utxo` (the outputs available to spend),
/// `other_hashes` (hashes that would make `tx` a duplicate), and
/// `already_spent` (outputs claimed by some other not-yet-committed
/// transaction this call must also treat as unavailable). Shared by
/// mempool-entry validation and in-block validation; the callers differ
/// only in which spent-set they pass.
fn validate_transaction_core(
    tx: &Transaction,
    utxo: &UtxoSet,
    other_hashes: &HashSet<String>,
    already_spent: &HashSet<(String, u32)>,
    miner_reward: u64,
) -> Result<(), TransactionValidationError> {
    let tx_hash = tx.hash();
    if other_hashes.contains(&tx_hash) {
        return Err(TransactionValidationError::DuplicateHash(tx_hash));
    }

    if tx.is_coinbase() {
        if tx.outputs.len() != 1 || tx.outputs[0].amount != miner_reward {
            return Err(TransactionValidationError::InvalidCoinbaseReward);
        }
        return Ok(());
    }

    let mut seen = HashSet::new();
    let mut input_total: u64 = 0;
    for input in &tx.inputs {
        let key = (input.tx_id.clone(), input.index);
        if !seen.insert(key.clone()) {
            return Err(TransactionValidationError::DoubleSpendWithinTransaction);
        }
        if already_spent.contains(&key) {
            return Err(TransactionValidationError::DoubleSpendPending(input.tx_id.clone(), input.index));
        }
        let output = utxo
            .get(&input.tx_id, input.index)
            .ok_or_else(|| TransactionValidationError::MissingUtxo(input.tx_id.clone(), input.index))?;
        let expected_address = quorumchain_crypto::address(&input.pubkey)
            .map_err(|_| TransactionValidationError::InvalidPubkey)?;
        if expected_address != output.address {
            return Err(TransactionValidationError::AddressMismatch);
        }
        if !quorumchain_crypto::verify(&input.pubkey, &input.signature, &input.tx_id, input.index) {
            return Err(TransactionValidationError::BadSignature);
        }
        input_total += output.amount;
    }

    if input_total < tx.output_total() {
        return Err(TransactionValidationError::Overspend);
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub pending_txs: Vec<Transaction>,
    pub utxo: UtxoSet,
    constants: Constants,
}

impl Blockchain {
    pub fn new(constants: Constants) -> Self {
        Blockchain {
            chain: vec![Block::genesis()],
            pending_txs: Vec::new(),
            utxo: UtxoSet::new(),
            constants,
        }
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain always has at least the genesis block")
    }

    fn committed_tx_hashes(&self) -> HashSet<String> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter().map(|tx| tx.hash()))
            .collect()
    }

    /// Rule checks described in full at `§4.L add_transaction` of the
    /// component design: hash uniqueness, coinbase rejection (coinbase
    /// transactions only come from `mine_block`), per-input UTXO
    /// existence/ownership/signature, and a non-negative surplus.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<(), TransactionValidationError> {
        let mut other_hashes: HashSet<String> = self.pending_txs.iter().map(|t| t.hash()).collect();
        other_hashes.extend(self.committed_tx_hashes());

        let pending_spent: HashSet<(String, u32)> = self
            .pending_txs
            .iter()
            .flat_map(|t| t.inputs.iter().map(|i| (i.tx_id.clone(), i.index)))
            .collect();

        validate_transaction_core(tx, &self.utxo, &other_hashes, &pending_spent, self.constants.miner_reward)
    }

    /// Validates `tx` and, on success, appends it to `pending_txs`.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        match self.validate_transaction(&tx) {
            Ok(()) => {
                self.pending_txs.push(tx);
                true
            }
            Err(e) => {
                log::debug!("rejecting transaction: {}", e);
                false
            }
        }
    }

    /// Constructs a candidate block whose transactions are a freshly
    /// minted coinbase followed by a snapshot of `pending_txs`, then
    /// searches nonces until the hash meets the configured difficulty.
    ///
    /// `pending_txs` is cleared immediately, before consensus on this
    /// candidate completes. If this proposal loses the vote, those
    /// transactions are gone — they are not restored from a shadow copy.
    /// This mirrors a known hazard in the source this was modeled on;
    /// see the design notes for why it is left as-is.
    pub fn mine_block(&mut self, miner_address: &str) -> Block {
        let coinbase = Transaction::coinbase(miner_address, self.constants.miner_reward, self.chain.len() as u64);
        let mut transactions = Vec::with_capacity(1 + self.pending_txs.len());
        transactions.push(coinbase);
        transactions.extend(self.pending_txs.drain(..));

        let index = self.chain.len() as u64;
        let previous_hash = self.tip().hash();
        let timestamp = current_timestamp();

        let mut nonce = 0u64;
        loop {
            let candidate = Block {
                index,
                previous_hash: previous_hash.clone(),
                transactions: transactions.clone(),
                nonce,
                timestamp,
            };
            if candidate.is_well_formed(self.constants.difficulty) {
                return candidate;
            }
            nonce += 1;
        }
    }

    fn validate_block_detail(
        &self,
        prefix: &[Block],
        block: &Block,
        base_utxo: &UtxoSet,
        base_hashes: &HashSet<String>,
    ) -> Result<UtxoSet, BlockValidationError> {
        let tip = prefix.last().ok_or(BlockValidationError::EmptyPrefix)?;

        if !block.is_well_formed(self.constants.difficulty) {
            return Err(BlockValidationError::NotWellFormed);
        }
        if block.index != prefix.len() as u64 {
            return Err(BlockValidationError::WrongIndex { expected: prefix.len() as u64, actual: block.index });
        }
        if block.previous_hash != tip.hash() {
            return Err(BlockValidationError::WrongPreviousHash);
        }
        if block.transactions.is_empty() {
            return Err(BlockValidationError::MissingCoinbase);
        }

        let mut temp_utxo = base_utxo.clone();
        let mut temp_hashes = base_hashes.clone();
        let no_extra_spent = HashSet::new();

        for (i, tx) in block.transactions.iter().enumerate() {
            if i == 0 {
                if !tx.is_coinbase() {
                    return Err(BlockValidationError::MissingCoinbase);
                }
            } else if tx.is_coinbase() {
                return Err(BlockValidationError::UnexpectedCoinbase);
            }

            validate_transaction_core(tx, &temp_utxo, &temp_hashes, &no_extra_spent, self.constants.miner_reward)?;

            temp_hashes.insert(tx.hash());
            temp_utxo.update_with_transaction(tx);
        }

        Ok(temp_utxo)
    }

    /// True iff `block` is well-formed, extends the local tip, and every
    /// transaction in it (the coinbase included) validates against a
    /// UTXO view that already reflects earlier transactions in the same
    /// block.
    pub fn validate_block(&self, block: &Block) -> bool {
        self.validate_block_detail(&self.chain, block, &self.utxo, &self.committed_tx_hashes()).is_ok()
    }

    /// Validates and, on success, appends `block` and folds it into the
    /// UTXO set.
    pub fn add_block(&mut self, block: Block) -> bool {
        match self.validate_block_detail(&self.chain, &block, &self.utxo, &self.committed_tx_hashes()) {
            Ok(new_utxo) => {
                self.chain.push(block);
                self.utxo = new_utxo;
                true
            }
            Err(e) => {
                log::debug!("rejecting block: {}", e);
                false
            }
        }
    }

    /// Removes each input's referenced output from `utxo`; inserts each
    /// output of `tx`. Exposed as a standalone operation because the
    /// round loop (see the node crate) applies it when committing blocks
    /// assembled outside of `add_block`'s own bookkeeping.
    pub fn update_utxo_set(&mut self, tx: &Transaction) {
        self.utxo.update_with_transaction(tx);
    }

    fn prune_stale_pending(&mut self) {
        let utxo_snapshot = self.utxo.clone();
        self.pending_txs.retain(|tx| {
            !tx.is_coinbase()
                && tx.inputs.iter().all(|input| utxo_snapshot.contains(&input.tx_id, input.index))
        });
    }

    /// Rebuilds `utxo` from scratch by folding every committed
    /// transaction, in order, over an empty set. Also drops any
    /// `pending_txs` entry whose inputs no longer reference a spendable
    /// output under the rebuilt set. Idempotent: calling it twice in a
    /// row yields the same UTXO.
    pub fn rebuild_utxo_set(&mut self) {
        let mut utxo = UtxoSet::new();
        for block in &self.chain {
            for tx in &block.transactions {
                utxo.update_with_transaction(tx);
            }
        }
        self.utxo = utxo;
        self.prune_stale_pending();
    }

    /// Sum of UTXO amounts owned by `address`.
    pub fn get_balance(&self, address: &str) -> u64 {
        self.utxo.balance_of(address)
    }

    /// Accepts `new_chain` iff it is strictly longer than the local
    /// chain, its first block equals the local genesis, and every
    /// successive block validates against a UTXO rebuilt incrementally
    /// from the new chain's own prefix. On acceptance, replaces the
    /// chain and UTXO and prunes stale pending transactions.
    pub fn try_to_update_chain(&mut self, new_chain: Vec<Block>) -> bool {
        if new_chain.len() <= self.chain.len() {
            return false;
        }
        if new_chain.first() != Some(&Block::genesis()) {
            return false;
        }

        let mut validated_prefix: Vec<Block> = vec![new_chain[0].clone()];
        let mut utxo = UtxoSet::new();
        let mut hashes: HashSet<String> = HashSet::new();

        for block in &new_chain[1..] {
            match self.validate_block_detail(&validated_prefix, block, &utxo, &hashes) {
                Ok(new_utxo) => {
                    hashes.extend(block.transactions.iter().map(|tx| tx.hash()));
                    utxo = new_utxo;
                    validated_prefix.push(block.clone());
                }
                Err(e) => {
                    log::debug!("rejecting candidate chain at height {}: {}", block.index, e);
                    return false;
                }
            }
        }

        self.chain = new_chain;
        self.utxo = utxo;
        self.prune_stale_pending();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumchain_crypto::Wallet;

    fn fresh_chain() -> Blockchain {
        Blockchain::new(Constants::default())
    }

    fn spend(wallet: &Wallet, coinbase: &Transaction, outputs: Vec<(u64, &str)>) -> Transaction {
        let tx_id = coinbase.hash();
        let signature = wallet.sign(&tx_id, 0).unwrap();
        Transaction::new(
            vec![crate::transaction::TxInput {
                tx_id,
                index: 0,
                signature,
                pubkey: wallet.public_key_hex(),
            }],
            outputs
                .into_iter()
                .map(|(amount, address)| crate::transaction::TxOutput { amount, address: address.to_string() })
                .collect(),
            Default::default(),
        )
    }

    #[test]
    fn genesis_only_chain_has_zero_balance_for_anyone() {
        let chain = fresh_chain();
        assert_eq!(chain.chain.len(), 1);
        assert_eq!(chain.get_balance("anyone"), 0);
    }

    #[test]
    fn mining_a_block_pays_the_miner_reward() {
        let mut chain = fresh_chain();
        let block = chain.mine_block("alice");
        assert!(chain.add_block(block));
        assert_eq!(chain.get_balance("alice"), 50);
        assert_eq!(chain.chain.len(), 2);
        assert_eq!(chain.chain[1].transactions.len(), 1);
    }

    #[test]
    fn empty_pending_txs_mines_a_coinbase_only_block() {
        let mut chain = fresh_chain();
        let block = chain.mine_block("alice");
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
    }

    #[test]
    fn valid_spend_moves_funds_between_addresses() {
        let mut chain = fresh_chain();
        let wallet = Wallet::generate();
        let alice_address = wallet.address();

        let block = chain.mine_block(&alice_address);
        assert!(chain.add_block(block));
        let coinbase = chain.chain[1].transactions[0].clone();

        let tx = spend(&wallet, &coinbase, vec![(30, "bob"), (20, &alice_address)]);
        assert!(chain.add_transaction(tx));

        let block2 = chain.mine_block("carol");
        assert!(chain.add_block(block2));

        assert_eq!(chain.get_balance(&alice_address), 20);
        assert_eq!(chain.get_balance("bob"), 30);
    }

    #[test]
    fn overspend_is_rejected() {
        let mut chain = fresh_chain();
        let wallet = Wallet::generate();
        let alice_address = wallet.address();

        let block = chain.mine_block(&alice_address);
        assert!(chain.add_block(block));
        let coinbase = chain.chain[1].transactions[0].clone();

        let tx = spend(&wallet, &coinbase, vec![(60, "bob")]);
        assert!(chain.validate_transaction(&tx).is_err());
        assert!(!chain.add_transaction(tx));
    }

    #[test]
    fn duplicate_transaction_is_rejected() {
        let mut chain = fresh_chain();
        let wallet = Wallet::generate();
        let alice_address = wallet.address();

        let block = chain.mine_block(&alice_address);
        assert!(chain.add_block(block));
        let coinbase = chain.chain[1].transactions[0].clone();

        let tx = spend(&wallet, &coinbase, vec![(50, "bob")]);
        assert!(chain.add_transaction(tx.clone()));
        assert!(!chain.add_transaction(tx));
    }

    #[test]
    fn chain_replacement_rejects_equal_length_chains() {
        let mut chain = fresh_chain();
        let same_length = chain.chain.clone();
        assert!(!chain.try_to_update_chain(same_length));
    }

    #[test]
    fn chain_sync_adopts_a_longer_valid_chain() {
        let mut node_a = fresh_chain();
        let block = node_a.mine_block("miner-a");
        assert!(node_a.add_block(block));

        let mut node_b = fresh_chain();
        assert!(node_b.try_to_update_chain(node_a.chain.clone()));
        assert_eq!(node_b.get_balance("miner-a"), 50);
        assert_eq!(node_b.chain, node_a.chain);
    }

    #[test]
    fn rebuild_utxo_set_is_idempotent() {
        let mut chain = fresh_chain();
        let block = chain.mine_block("alice");
        assert!(chain.add_block(block));

        chain.rebuild_utxo_set();
        let first = chain.utxo.clone();
        chain.rebuild_utxo_set();
        assert_eq!(chain.utxo, first);
    }

    #[test]
    fn quorum_commit_scenario_grows_chain_and_pays_leader() {
        // Exercises the ledger half of the seeded "quorum commit"
        // end-to-end scenario: a leader's own block, once accepted by
        // `add_block`, leaves the chain one block taller.
        let mut chain = fresh_chain();
        let before = chain.chain.len();
        let block = chain.mine_block("leader");
        assert!(chain.add_block(block));
        assert_eq!(chain.chain.len(), before + 1);
    }
}
