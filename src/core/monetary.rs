//! Monetary rules of the chain
//!
//! Amounts are integers in the smallest unit. The coinbase reward starts at
//! [`BLOCK_REWARD`], halves every [`HALVING_INTERVAL`] blocks, never drops
//! below [`MIN_BLOCK_REWARD`] and stops once [`MAX_SUPPLY`] is emitted.

use crate::config::ConsensusParams;

/// Reward of the first blocks
pub const BLOCK_REWARD: u64 = 256_000_000;

/// Floor of the halving schedule
pub const MIN_BLOCK_REWARD: u64 = 1_000_000;

/// Blocks between two halvings
pub const HALVING_INTERVAL: u64 = 52_960;

pub const MAX_SUPPLY: u64 = 27_000_000_000_000;

/// Fixed fee charged by the transfer builder
pub const TRANSFER_FEE: u64 = 1_000_000;

/// Reward of the block following `prev_index`, whose supply will be
/// `new_supply`. The result never lets `new_supply + reward` exceed the max
/// supply.
pub fn next_coinbase_reward(prev_index: u64, new_supply: u64, params: &ConsensusParams) -> u64 {
    let halvings = prev_index.saturating_add(1) / params.halving_interval;
    let halved = u32::try_from(halvings)
        .ok()
        .and_then(|shift| params.block_reward.checked_shr(shift))
        .unwrap_or(0);
    let reward = halved.max(params.min_block_reward);

    let headroom = params.max_supply.saturating_sub(new_supply);
    reward.min(headroom)
}
