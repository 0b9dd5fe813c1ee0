//! The chain orchestrator
//!
//! [`FullNode`] owns the committed chain, the ledger index, the mempool and
//! the candidate block, and is the only place where a block gets committed.

pub mod full_node;

pub use full_node::{FullNode, ProposalOutcome};
