use crate::config::ConsensusParams;
use crate::core::block::{BlockData, GENESIS_DIFFICULTY};
use crate::error::{BlockchainError, Result};
use log::info;

const MIN_DIFFICULTY: u32 = 1;

/// Retargets the difficulty every `blocks_before_adjustment` blocks so the
/// average block time drifts back towards the target
pub struct DifficultyAdjustment;

impl DifficultyAdjustment {
    /// Difficulty of the block following `chain`
    pub fn calculate_next_difficulty(chain: &[BlockData], params: &ConsensusParams) -> Result<u32> {
        let Some(last) = chain.last() else {
            return Ok(GENESIS_DIFFICULTY);
        };
        let difficulty = last.get_difficulty().max(MIN_DIFFICULTY);
        let index = last.get_index();

        if index == 0 || index % params.blocks_before_adjustment != 0 {
            return Ok(difficulty);
        }

        let average = Self::average_block_time(chain, params.blocks_before_adjustment)?;
        let deviation = 1.0 - average / params.target_block_time_ms as f64;
        let deviation_percentage = deviation * 100.0;

        let steps = (deviation_percentage.abs() / f64::from(params.threshold_per_step)).floor();
        let capped = steps.min(f64::from(params.max_steps_per_adjustment)) as i64;
        // positive deviation: blocks come too fast
        let increment = if deviation > 0.0 { capped } else { -capped };
        let new_difficulty = (i64::from(difficulty) + increment).max(i64::from(MIN_DIFFICULTY));
        let new_difficulty = u32::try_from(new_difficulty).unwrap_or(u32::MAX);

        info!(
            "Difficulty adjustment at height {index}: {difficulty} -> {new_difficulty} (average: {average:.0}ms, deviation: {deviation_percentage:.2}%)"
        );
        Ok(new_difficulty)
    }

    /// Average time between the last `window` blocks (fewer if the chain is
    /// shorter), in milliseconds
    pub fn average_block_time(chain: &[BlockData], window: u64) -> Result<f64> {
        let count = chain.len().min(usize::try_from(window).unwrap_or(usize::MAX));
        if count < 2 {
            return Err(BlockchainError::Consensus(
                "Need at least 2 blocks to average block time".to_string(),
            ));
        }

        let oldest = &chain[chain.len() - count];
        let newest = &chain[chain.len() - 1];
        let (Some(start), Some(end)) = (oldest.get_timestamp(), newest.get_timestamp()) else {
            return Err(BlockchainError::Structural(
                "Committed block without timestamp".to_string(),
            ));
        };

        Ok(end.saturating_sub(start) as f64 / (count - 1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::synthetic_chain;

    fn params() -> ConsensusParams {
        ConsensusParams {
            target_block_time_ms: 2_000,
            ..ConsensusParams::default()
        }
    }

    #[test]
    fn test_empty_chain_uses_genesis_difficulty() {
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&[], &params()).unwrap(),
            GENESIS_DIFFICULTY
        );
    }

    #[test]
    fn test_no_adjustment_between_periods() {
        let chain = synthetic_chain(144, 7, 1_000);
        assert_eq!(chain.last().unwrap().get_index(), 143);
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&chain, &params()).unwrap(),
            7
        );
    }

    #[test]
    fn test_fast_chain_increases_difficulty() {
        // blocks 0..=144 one second apart against a two second target
        let chain = synthetic_chain(145, 7, 1_000);
        assert_eq!(
            DifficultyAdjustment::average_block_time(&chain, 144).unwrap(),
            1_000.0
        );
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&chain, &params()).unwrap(),
            12
        );
    }

    #[test]
    fn test_slow_chain_decreases_difficulty() {
        // average 6s: deviation -200%, capped at 8 steps, floored at 1
        let chain = synthetic_chain(145, 3, 6_000);
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&chain, &params()).unwrap(),
            1
        );

        let chain = synthetic_chain(145, 20, 6_000);
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&chain, &params()).unwrap(),
            12
        );
    }

    #[test]
    fn test_out_of_order_timestamps_do_not_overflow() {
        let mut chain = synthetic_chain(145, 7, 1_000);
        chain[1].set_proof("00000000", i64::MAX);
        chain[144].set_proof("00000000", i64::MIN);
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&chain, &params()).unwrap(),
            15
        );
    }

    #[test]
    fn test_on_target_keeps_difficulty() {
        let chain = synthetic_chain(145, 9, 2_050);
        assert_eq!(
            DifficultyAdjustment::calculate_next_difficulty(&chain, &params()).unwrap(),
            9
        );
    }
}
