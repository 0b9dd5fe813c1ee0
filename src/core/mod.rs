//! Core ledger functionality
//!
//! Blocks, transactions and their lock scripts, the validation pipeline,
//! proof-of-work with difficulty retargeting, the monetary schedule and the
//! miner.

pub mod block;
pub mod difficulty;
pub mod miner;
pub mod monetary;
pub mod proof_of_work;
pub mod script;
pub mod transaction;
pub mod validation;

pub use block::{BlockData, GENESIS_DIFFICULTY, GENESIS_PREV_HASH};
pub use difficulty::DifficultyAdjustment;
pub use miner::{Miner, MiningProposal};
pub use monetary::{
    next_coinbase_reward, BLOCK_REWARD, HALVING_INTERVAL, MAX_SUPPLY, MIN_BLOCK_REWARD,
    TRANSFER_FEE,
};
pub use proof_of_work::{ProofOfWork, MIN_NONCE_HEX_LEN, NONCE_BYTES};
pub use script::{get_lock_script, LockScript, SIGNATURE_V1};
pub use transaction::{Transaction, TransactionIO, Transfer, TxInput, TX_IO_VERSION};
pub use validation::{parse_witness, TxRole, Validator};
