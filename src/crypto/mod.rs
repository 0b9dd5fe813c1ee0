//! Crypto Provider capability
//!
//! The ledger engine never calls hashing or signing primitives directly; it
//! goes through an injected [`CryptoProvider`] so tests and embedders can
//! choose parameters and implementations.

pub mod provider;

pub use provider::{
    CryptoProvider, HashOutput, HashParams, HashVariant, KeyPairHex, StandardCrypto,
    PUBLIC_KEY_HEX_LEN,
};
