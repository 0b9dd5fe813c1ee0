use crate::error::{BlockchainError, Result};
use crate::utils::{bits_string, hex_decode};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADDRESS_LENGTH: usize = 20;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Address type, read from the first character of an address. Stronger types
/// require the owner's public key to start with more zero bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Weak,
    Contrast,
    Secure,
    Powerful,
    Ultimate,
}

impl AddressType {
    pub const ALL: [AddressType; 5] = [
        AddressType::Weak,
        AddressType::Contrast,
        AddressType::Secure,
        AddressType::Powerful,
        AddressType::Ultimate,
    ];

    pub fn from_prefix(prefix: char) -> Option<AddressType> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    pub fn prefix(&self) -> char {
        match self {
            AddressType::Weak => 'W',
            AddressType::Contrast => 'C',
            AddressType::Secure => 'S',
            AddressType::Powerful => 'P',
            AddressType::Ultimate => 'U',
        }
    }

    pub fn zero_bits(&self) -> usize {
        match self {
            AddressType::Weak => 0,
            AddressType::Contrast => 4,
            AddressType::Secure => 8,
            AddressType::Powerful => 12,
            AddressType::Ultimate => 16,
        }
    }
}

/// Checks the length, the alphabet and the type prefix of an address
pub fn conformity_check(address: &str) -> Result<AddressType> {
    if address.chars().count() != ADDRESS_LENGTH {
        return Err(BlockchainError::Structural(format!(
            "Invalid address length for {address:?}: expected {ADDRESS_LENGTH}"
        )));
    }
    if let Some(c) = address.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
        return Err(BlockchainError::Structural(format!(
            "Invalid base58 character {c:?} in address {address}"
        )));
    }

    address
        .chars()
        .next()
        .and_then(AddressType::from_prefix)
        .ok_or_else(|| {
            BlockchainError::Structural(format!("Unknown address type prefix in {address}"))
        })
}

/// The public key behind `address` must start with as many zero bits as the
/// address type requires
pub fn security_check(address: &Address, public_key_hex: &str) -> Result<()> {
    let kind = address.address_type()?;
    let bits = bits_string(&hex_decode(public_key_hex)?);
    let zero_bits = kind.zero_bits();

    if bits.len() < zero_bits || bits.chars().take(zero_bits).any(|bit| bit != '0') {
        return Err(BlockchainError::Crypto(format!(
            "Public key does not meet the {zero_bits} zero bits required by {address}"
        )));
    }
    Ok(())
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(address: &str) -> Result<Address> {
        conformity_check(address)?;
        Ok(Address(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn address_type(&self) -> Result<AddressType> {
        conformity_check(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = BlockchainError;

    fn try_from(value: String) -> Result<Self> {
        conformity_check(&value)?;
        Ok(Address(value))
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conformity_check() {
        assert_eq!(
            conformity_check("WCHMD65Q7qR2uH9XF5dJ").unwrap(),
            AddressType::Weak
        );
        assert_eq!(
            conformity_check("UCHMD65Q7qR2uH9XF5dJ").unwrap(),
            AddressType::Ultimate
        );
        // wrong length
        assert!(conformity_check("WCHMD65Q7qR2uH9XF5d").is_err());
        // unknown prefix
        assert!(conformity_check("XCHMD65Q7qR2uH9XF5dJ").is_err());
        // '0' is not base58
        assert!(conformity_check("WCHMD65Q7qR2uH9XF50J").is_err());
    }

    #[test]
    fn test_security_check_counts_zero_bits() {
        let contrast = Address::parse("CCHMD65Q7qR2uH9XF5dJ").unwrap();
        let weak = Address::parse("WCHMD65Q7qR2uH9XF5dJ").unwrap();

        let strong_key = format!("0f{}", "ab".repeat(31));
        let weak_key = format!("f0{}", "ab".repeat(31));

        assert!(security_check(&contrast, &strong_key).is_ok());
        assert!(matches!(
            security_check(&contrast, &weak_key),
            Err(BlockchainError::Crypto(_))
        ));
        assert!(security_check(&weak, &weak_key).is_ok());
    }

    #[test]
    fn test_address_serde_enforces_format() {
        let address = Address::parse("SCHMD65Q7qR2uH9XF5dJ").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"SCHMD65Q7qR2uH9XF5dJ\"");

        let decoded: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, address);
        assert!(serde_json::from_str::<Address>("\"short\"").is_err());
    }
}
