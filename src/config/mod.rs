//! Configuration management
//!
//! Node settings are loaded once (TOML file or defaults) and handed to the
//! node, the miner and the crypto provider explicitly.

pub mod settings;

pub use settings::{ConsensusParams, MiningSettings, Settings, CONFIG_PATH_ENV};
