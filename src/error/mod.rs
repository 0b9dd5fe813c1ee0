//! Error handling for the ledger engine
//!
//! Every fallible operation in the crate returns [`BlockchainError`]. The
//! variants follow the rejection taxonomy of the node: caller mistakes
//! (structural, economic, crypto, consensus) are non-fatal, a ledger error
//! means the node's own state or its chain is corrupt.

use std::fmt;

/// Result type alias for ledger engine operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Malformed transaction or block fields
    Structural(String),
    /// Fee, supply or reward rule violated
    Economic(String),
    /// Inputs do not cover the requested transfers plus the fee
    InsufficientFunds { required: u64, available: u64 },
    /// Hash mismatch, bad signature, unresolvable address derivation
    Crypto(String),
    /// Referenced UTXO missing or balance invariant violated
    Ledger(String),
    /// Proposed hash does not satisfy the candidate's difficulty
    Consensus(String),
    /// Storage collaborator failure
    Persistence(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
}

impl BlockchainError {
    /// Only ledger corruption must stop further block digestion.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BlockchainError::Ledger(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            BlockchainError::Structural(_) | BlockchainError::Serialization(_) => "structural",
            BlockchainError::Economic(_) | BlockchainError::InsufficientFunds { .. } => "economic",
            BlockchainError::Crypto(_) => "crypto",
            BlockchainError::Ledger(_) => "ledger",
            BlockchainError::Consensus(_) => "consensus",
            BlockchainError::Persistence(_) | BlockchainError::Io(_) => "persistence",
            BlockchainError::Config(_) => "config",
        }
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Structural(msg) => write!(f, "Structural error: {msg}"),
            BlockchainError::Economic(msg) => write!(f, "Economic error: {msg}"),
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Ledger(msg) => write!(f, "Ledger error: {msg}"),
            BlockchainError::Consensus(msg) => write!(f, "Consensus error: {msg}"),
            BlockchainError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Persistence(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
