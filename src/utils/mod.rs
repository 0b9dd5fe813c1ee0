//! Utility functions and helpers
//!
//! Raw cryptographic primitives, encoding helpers, bincode serialization and
//! logger initialisation shared by the rest of the crate.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    argon2_digest, base58_encode, bits_string, current_timestamp, ed25519_public_key,
    ed25519_sign, ed25519_verify, hex_decode, hex_encode, random_bytes, sha256_digest,
    ED25519_SEED_LEN,
};

pub use serialization::{deserialize, serialize};

use log::LevelFilter;

/// Installs `env_logger` at `level` unless a logger is already set.
/// `RUST_LOG` still overrides per-module filters.
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}
