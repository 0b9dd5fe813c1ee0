//! Wallet management
//!
//! Typed addresses, signing accounts and the deterministic wallet that
//! derives them from a master seed.

pub mod account;
pub mod address;
#[allow(clippy::module_inception)]
pub mod wallet;

pub use account::Account;
pub use address::{conformity_check, security_check, Address, AddressType, ADDRESS_LENGTH};
pub use wallet::Wallet;
