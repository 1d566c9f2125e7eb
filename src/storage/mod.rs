//! Data storage and persistence
//!
//! The ledger only talks to a [`ChainStore`]; [`JsonFileStore`] keeps the
//! chain as two JSON arrays on disk and [`MemoryStore`] keeps it in memory.

pub mod json_store;

pub use json_store::{JsonFileStore, FILE_NAME_BLOCKS, FILE_NAME_COINBASE};

use crate::core::{Block, Transaction};
use crate::error::{MinerError, Result};
use std::sync::Mutex;

/// Both persisted collections, as loaded
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub coinbase: Vec<Transaction>,
}

/// Durable home of the block and coinbase sequences
pub trait ChainStore {
    /// `None` when nothing has been saved yet
    fn load(&self) -> Result<Option<ChainSnapshot>>;

    /// Write both sequences; must never leave them inconsistent with each other
    fn save(&self, blocks: &[Block], coinbase: &[Transaction]) -> Result<()>;
}

/// Keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<ChainSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_snapshot(snapshot: ChainSnapshot) -> MemoryStore {
        MemoryStore {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<Option<ChainSnapshot>> {
        let snapshot = self
            .snapshot
            .lock()
            .map_err(|e| MinerError::Io(format!("Memory store poisoned: {e}")))?;
        Ok(snapshot.clone())
    }

    fn save(&self, blocks: &[Block], coinbase: &[Transaction]) -> Result<()> {
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|e| MinerError::Io(format!("Memory store poisoned: {e}")))?;
        *snapshot = Some(ChainSnapshot {
            blocks: blocks.to_vec(),
            coinbase: coinbase.to_vec(),
        });
        Ok(())
    }
}
