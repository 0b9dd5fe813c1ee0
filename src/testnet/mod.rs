//! Shared fixtures for unit tests
//!
//! Light Argon2 parameters, deterministic accounts and hand-built blocks so
//! the ledger, pool and node can be exercised without real mining costs.

pub mod test_utils;

pub use test_utils::*;
