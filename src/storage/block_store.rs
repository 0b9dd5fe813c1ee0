use crate::core::BlockData;
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const BLOCKS_TREE: &str = "blocks";
const SUMMARY_TREE: &str = "chain_summary";

/// One row of the per-block statistics written at load time
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct BlockSummary {
    pub block_index: u64,
    pub coinbase_reward: u64,
    pub timestamp: i64,
    pub difficulty: u32,
    /// Milliseconds since the previous block, 0 for genesis
    pub time_between_blocks: i64,
}

impl BlockSummary {
    pub fn from_chain(chain: &[BlockData]) -> Result<Vec<BlockSummary>> {
        let mut rows = Vec::with_capacity(chain.len());
        let mut previous: Option<i64> = None;

        for block in chain {
            let timestamp = block.get_timestamp().ok_or_else(|| {
                BlockchainError::Structural(format!(
                    "Committed block {} has no timestamp",
                    block.get_index()
                ))
            })?;
            rows.push(BlockSummary {
                block_index: block.get_index(),
                coinbase_reward: block.get_coin_base(),
                timestamp,
                difficulty: block.get_difficulty(),
                time_between_blocks: previous.map_or(0, |prev| timestamp.saturating_sub(prev)),
            });
            previous = Some(timestamp);
        }
        Ok(rows)
    }
}

/// Where committed blocks live between runs
pub trait BlockStore: Send + Sync {
    /// Every committed block, ordered by index
    fn load_chain(&self) -> Result<Vec<BlockData>>;

    fn save_block(&self, block: &BlockData) -> Result<()>;

    fn save_chain_summary(&self, rows: &[BlockSummary]) -> Result<()>;
}

/// Volatile store, mostly for tests. Writes can be switched off to exercise
/// the node's rollback path.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<Vec<BlockData>>,
    summary: Mutex<Vec<BlockSummary>>,
    reject_writes: AtomicBool,
}

impl MemoryBlockStore {
    pub fn new() -> MemoryBlockStore {
        MemoryBlockStore::default()
    }

    pub fn with_blocks(blocks: Vec<BlockData>) -> MemoryBlockStore {
        MemoryBlockStore {
            blocks: Mutex::new(blocks),
            ..MemoryBlockStore::default()
        }
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn get_summary(&self) -> Vec<BlockSummary> {
        match self.summary.lock() {
            Ok(summary) => summary.clone(),
            Err(_) => {
                log::error!("Failed to acquire lock on block summary");
                Vec::new()
            }
        }
    }
}

impl BlockStore for MemoryBlockStore {
    fn load_chain(&self) -> Result<Vec<BlockData>> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| BlockchainError::Persistence("Block store lock poisoned".to_string()))?;
        Ok(blocks.clone())
    }

    fn save_block(&self, block: &BlockData) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(BlockchainError::Persistence(format!(
                "Block store rejected block {}",
                block.get_index()
            )));
        }
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| BlockchainError::Persistence("Block store lock poisoned".to_string()))?;
        blocks.push(block.clone());
        Ok(())
    }

    fn save_chain_summary(&self, rows: &[BlockSummary]) -> Result<()> {
        let mut summary = self
            .summary
            .lock()
            .map_err(|_| BlockchainError::Persistence("Block store lock poisoned".to_string()))?;
        *summary = rows.to_vec();
        Ok(())
    }
}

/// Embedded `sled` store. Blocks are keyed by their big-endian index so tree
/// iteration yields chain order.
pub struct SledBlockStore {
    db: Db,
}

impl SledBlockStore {
    pub fn open(path: &Path) -> Result<SledBlockStore> {
        let db = sled::open(path).map_err(|e| {
            BlockchainError::Persistence(format!("Failed to open database {}: {e}", path.display()))
        })?;
        info!("Opened block store at {}", path.display());
        Ok(SledBlockStore { db })
    }

    pub fn load_chain_summary(&self) -> Result<Vec<BlockSummary>> {
        let tree = self.open_tree(SUMMARY_TREE)?;
        tree.iter()
            .values()
            .map(|value| {
                let value = value.map_err(|e| {
                    BlockchainError::Persistence(format!("Failed to iterate summary tree: {e}"))
                })?;
                deserialize::<BlockSummary>(value.as_ref())
            })
            .collect()
    }

    fn open_tree(&self, name: &str) -> Result<sled::Tree> {
        self.db.open_tree(name).map_err(|e| {
            BlockchainError::Persistence(format!("Failed to open {name} tree: {e}"))
        })
    }
}

impl BlockStore for SledBlockStore {
    fn load_chain(&self) -> Result<Vec<BlockData>> {
        let tree = self.open_tree(BLOCKS_TREE)?;
        let blocks = tree
            .iter()
            .values()
            .map(|value| {
                let value = value.map_err(|e| {
                    BlockchainError::Persistence(format!("Failed to iterate blocks tree: {e}"))
                })?;
                BlockData::deserialize(value.as_ref())
            })
            .collect::<Result<Vec<BlockData>>>()?;
        debug!("Loaded {} blocks from store", blocks.len());
        Ok(blocks)
    }

    fn save_block(&self, block: &BlockData) -> Result<()> {
        let tree = self.open_tree(BLOCKS_TREE)?;
        let bytes = block.serialize()?;
        tree.insert(block.get_index().to_be_bytes(), bytes)
            .map_err(|e| {
                BlockchainError::Persistence(format!(
                    "Failed to save block {}: {e}",
                    block.get_index()
                ))
            })?;
        tree.flush()
            .map_err(|e| BlockchainError::Persistence(format!("Failed to flush blocks: {e}")))?;
        Ok(())
    }

    fn save_chain_summary(&self, rows: &[BlockSummary]) -> Result<()> {
        let tree = self.open_tree(SUMMARY_TREE)?;
        let mut batch = sled::Batch::default();
        for row in rows {
            batch.insert(row.block_index.to_be_bytes().to_vec(), serialize(row)?);
        }
        tree.apply_batch(batch).map_err(|e| {
            BlockchainError::Persistence(format!("Failed to save chain summary: {e}"))
        })?;
        Ok(())
    }
}
