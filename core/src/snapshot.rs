//! Optional JSON snapshot bootstrap, matching the `chain` message payload.
//!
//! The ledger never calls these on its own — the chain is not
//! persisted to disk as part of normal operation (see the Non-goals).
//! A CLI or benchmarking harness may call [`load_snapshot`] once at
//! startup to seed a node's chain without waiting for peer sync, or
//! [`write_snapshot`] to capture one for later reuse.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::block::Block;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    blocks: Vec<Block>,
}

pub fn load_snapshot(path: impl AsRef<Path>) -> io::Result<Vec<Block>> {
    let contents = fs::read_to_string(path)?;
    let snapshot: SnapshotFile = serde_json::from_str(&contents)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(snapshot.blocks)
}

pub fn write_snapshot(path: impl AsRef<Path>, blocks: &[Block]) -> io::Result<()> {
    let snapshot = SnapshotFile { blocks: blocks.to_vec() };
    let contents = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, contents)
}
