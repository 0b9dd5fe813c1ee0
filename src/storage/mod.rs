//! Ledger state and persistence
//!
//! The hot ledger index rebuilt from the chain, the pool of pending
//! transactions and the block store collaborator with its in-memory and
//! `sled` implementations.

pub mod block_store;
pub mod hot_data;
pub mod memory_pool;

pub use block_store::{BlockStore, BlockSummary, MemoryBlockStore, SledBlockStore};
pub use hot_data::HotData;
pub use memory_pool::MemPool;
