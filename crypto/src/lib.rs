//! Wallet/crypto collaborator for QuorumChain.
//!
//! The ledger only ever calls three operations against this crate:
//! [`load_wallet`], [`Wallet::public_key_hex`] and [`Wallet::address`], plus
//! [`Wallet::sign`]/[`verify`] over the exact byte string `tx_id || index`
//! the ledger asks the wallet to sign. The ledger itself never inspects a
//! key or a signature — it treats pubkeys, signatures and addresses as
//! opaque strings produced and checked by this collaborator.

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
    #[error("failed to read wallet file: {0}")]
    WalletIo(#[from] std::io::Error),
}

/// A loaded keypair. Key material never leaves this type except as the
/// hex-encoded public key handed to peers over the wire.
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Wallet {
    /// Generates a fresh keypair. Used by tests and by nodes bootstrapping
    /// a wallet file for the first time; never called by the ledger.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        Wallet { secret_key, public_key }
    }

    /// Hex-encoded compressed public key, the `pubkey` string the ledger
    /// stores on `TxInput` and compares against `address(pubkey)`.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Derives the address string for this wallet's own public key.
    pub fn address(&self) -> String {
        address_of(&self.public_key)
    }

    /// Signs `tx_id || index` and returns the hex-encoded compact
    /// signature the ledger stores on `TxInput.signature`.
    pub fn sign(&self, tx_id_hex: &str, index: u32) -> Result<String, CryptoError> {
        let secp = Secp256k1::new();
        let digest = hash_spend(tx_id_hex, index);
        let msg = Message::from_slice(&digest)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let sig = secp.sign_ecdsa(&msg, &self.secret_key);
        Ok(hex::encode(sig.serialize_compact()))
    }
}

/// Derives the address string for a hex-encoded public key, as stored on
/// `TxInput.pubkey`. This is the `address(pubkey) -> string` operation
/// named in the external interface.
pub fn address(pubkey_hex: &str) -> Result<String, CryptoError> {
    let bytes = hex::decode(pubkey_hex)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let pubkey = PublicKey::from_slice(&bytes)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(address_of(&pubkey))
}

fn address_of(pubkey: &PublicKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pubkey.serialize());
    let hash = hasher.finalize();
    let payload = &hash[..20];

    let mut checksum_input = Vec::with_capacity(20);
    checksum_input.extend_from_slice(payload);
    let checksum = double_sha256(&checksum_input);

    let mut full = payload.to_vec();
    full.extend_from_slice(&checksum[..4]);
    bs58::encode(full).into_string()
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Verifies `signature` over `tx_id || index` against `pubkey`. Returns
/// `false` (not an error) for malformed hex — the caller treats an
/// unverifiable signature the same as a rejected one.
pub fn verify(pubkey_hex: &str, signature_hex: &str, tx_id_hex: &str, index: u32) -> bool {
    let Ok(pubkey_bytes) = hex::decode(pubkey_hex) else { return false };
    let Ok(public_key) = PublicKey::from_slice(&pubkey_bytes) else { return false };
    let Ok(sig_bytes) = hex::decode(signature_hex) else { return false };
    let Ok(signature) = secp256k1::ecdsa::Signature::from_compact(&sig_bytes) else { return false };

    let digest = hash_spend(tx_id_hex, index);
    let Ok(msg) = Message::from_slice(&digest) else { return false };

    let secp = Secp256k1::new();
    secp.verify_ecdsa(&msg, &signature, &public_key).is_ok()
}

fn hash_spend(tx_id_hex: &str, index: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tx_id_hex.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.finalize().into()
}

/// Loads private key material from a wallet file. The file format is an
/// external collaborator's concern (see the wallet file format Non-goal);
/// this reads a single hex-encoded 32-byte secret key, trimmed of
/// surrounding whitespace, which is the minimal format that satisfies the
/// three named operations.
pub fn load_wallet(path: impl AsRef<Path>) -> Result<Wallet, CryptoError> {
    let contents = fs::read_to_string(path)?;
    let bytes = hex::decode(contents.trim())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let secret_key = SecretKey::from_slice(&bytes)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    Ok(Wallet { secret_key, public_key })
}
