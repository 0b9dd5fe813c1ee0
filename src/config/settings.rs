use crate::core::monetary::{
    BLOCK_REWARD, HALVING_INTERVAL, MAX_SUPPLY, MIN_BLOCK_REWARD,
};
use crate::crypto::{HashParams, HashVariant};
use crate::error::{BlockchainError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable naming an optional TOML settings file
pub const CONFIG_PATH_ENV: &str = "CONTRAST_CONFIG";

/// Chain-wide economic and retargeting rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    pub target_block_time_ms: u64,
    /// Percentage of deviation worth one difficulty step
    pub threshold_per_step: u32,
    pub max_steps_per_adjustment: u32,
    pub blocks_before_adjustment: u64,
    pub block_reward: u64,
    pub min_block_reward: u64,
    pub halving_interval: u64,
    pub max_supply: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            target_block_time_ms: 2_000,
            threshold_per_step: 10,
            max_steps_per_adjustment: 8,
            blocks_before_adjustment: 144,
            block_reward: BLOCK_REWARD,
            min_block_reward: MIN_BLOCK_REWARD,
            halving_interval: HALVING_INTERVAL,
            max_supply: MAX_SUPPLY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub max_block_transactions: usize,
    pub worker_threads: usize,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            max_block_transactions: 1_000,
            worker_threads: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub consensus: ConsensusParams,
    /// Memory-hard hash used for block proof-of-work
    pub pow_hash: HashParams,
    /// Memory-hard hash used to derive addresses from public keys
    pub address_hash: HashParams,
    /// Memory-hard hash used to stretch a wallet master seed
    pub wallet_hash: HashParams,
    pub mining: MiningSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            consensus: ConsensusParams::default(),
            pow_hash: HashParams {
                time_cost: 1,
                memory_cost_kib: 1 << 18,
                parallelism: 1,
                variant: HashVariant::Argon2id,
                output_len: 32,
            },
            address_hash: HashParams {
                time_cost: 1,
                memory_cost_kib: 1 << 16,
                parallelism: 1,
                variant: HashVariant::Argon2id,
                output_len: 16,
            },
            wallet_hash: HashParams {
                time_cost: 27,
                memory_cost_kib: 1_024,
                parallelism: 1,
                variant: HashVariant::Argon2id,
                output_len: 26,
            },
            mining: MiningSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(contents: &str) -> Result<Settings> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Settings> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let settings = Self::from_toml_str(&contents)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Settings from the file named by `CONTRAST_CONFIG`, or the defaults
    pub fn from_env() -> Result<Settings> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => Ok(Settings::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let consensus = &self.consensus;
        if consensus.blocks_before_adjustment < 2 {
            return Err(BlockchainError::Config(
                "blocks_before_adjustment must be at least 2".to_string(),
            ));
        }
        if consensus.target_block_time_ms == 0 {
            return Err(BlockchainError::Config(
                "target_block_time_ms must be positive".to_string(),
            ));
        }
        if consensus.threshold_per_step == 0 {
            return Err(BlockchainError::Config(
                "threshold_per_step must be positive".to_string(),
            ));
        }
        if consensus.halving_interval == 0 {
            return Err(BlockchainError::Config(
                "halving_interval must be positive".to_string(),
            ));
        }
        if consensus.block_reward > consensus.max_supply {
            return Err(BlockchainError::Config(
                "block_reward exceeds max_supply".to_string(),
            ));
        }
        if self.mining.max_block_transactions == 0 {
            return Err(BlockchainError::Config(
                "max_block_transactions must be positive".to_string(),
            ));
        }
        self.pow_hash.validate()?;
        self.address_hash.validate()?;
        self.wallet_hash.validate()?;
        Ok(())
    }
}
