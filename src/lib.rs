//! # Contrast Chain
//!
//! A single-node proof-of-work ledger engine on the UTXO model.
//!
//! ## Layout
//! - `core/`: blocks, transactions and lock scripts, the validation
//!   pipeline, proof-of-work and difficulty retargeting, monetary schedule,
//!   the miner
//! - `storage/`: the hot ledger index, the mempool, block stores
//! - `node/`: [`FullNode`], which loads the chain and commits proposals
//! - `wallet/`: addresses, accounts and deterministic key derivation
//! - `crypto/`: the injected [`CryptoProvider`] and its standard implementation
//! - `config/`: [`Settings`] loaded from TOML
//! - `utils/`: raw primitives, bincode helpers, logging setup
//!
//! ## Typical flow
//! 1. `FullNode::load` replays the stored chain and builds a candidate
//! 2. a [`Miner`] searches a nonce for `FullNode::get_candidate`
//! 3. `FullNode::propose_block` recomputes the hash and commits, or leaves
//!    everything untouched
//! 4. wallets submit signed transfers with `FullNode::submit_transaction`

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod node;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use config::{ConsensusParams, MiningSettings, Settings};
pub use core::{
    BlockData, DifficultyAdjustment, Miner, MiningProposal, ProofOfWork, Transaction,
    TransactionIO, Transfer, TxInput, TxRole, Validator,
};
pub use crypto::{CryptoProvider, HashParams, HashVariant, StandardCrypto};
pub use error::{BlockchainError, Result};
pub use node::{FullNode, ProposalOutcome};
pub use storage::{BlockStore, BlockSummary, HotData, MemPool, MemoryBlockStore, SledBlockStore};
pub use utils::init_logging;
pub use wallet::{Account, Address, AddressType, Wallet};
