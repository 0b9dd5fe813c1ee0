use crate::crypto::{CryptoProvider, HashParams};
use crate::error::{BlockchainError, Result};
use crate::utils::{hex_decode, ED25519_SEED_LEN};
use crate::wallet::address::{security_check, Address, AddressType};
use crate::wallet::Account;
use log::{debug, warn};
use std::collections::HashMap;
use zeroize::Zeroizing;

const WALLET_SALT: &[u8] = b"Contrast's Salt Isnt Pepper But It Is Tasty";

/// Hex chars appended to the master seed for every derivation attempt
const SEED_MODIFIER_HEX_LEN: usize = 12;

/// Attempts per account before derivation gives up, scaled by the address type
const BASE_DERIVATION_ATTEMPTS: u64 = 65_536;

/// Deterministic account factory rooted in a stretched master seed
pub struct Wallet {
    master_hex: Zeroizing<String>,
    accounts: HashMap<AddressType, Vec<Account>>,
}

impl Wallet {
    /// Stretches `mnemonic_hex` with the wallet hash into the master seed
    pub fn restore(
        crypto: &dyn CryptoProvider,
        mnemonic_hex: &str,
        params: &HashParams,
    ) -> Result<Wallet> {
        let seed_hex_len = params.output_len * 2 + SEED_MODIFIER_HEX_LEN;
        if seed_hex_len != ED25519_SEED_LEN * 2 {
            return Err(BlockchainError::Config(format!(
                "Wallet hash output must be {} bytes, got {}",
                ED25519_SEED_LEN - SEED_MODIFIER_HEX_LEN / 2,
                params.output_len
            )));
        }

        let master = crypto.hash_password(mnemonic_hex.as_bytes(), WALLET_SALT, params)?;
        Ok(Wallet {
            master_hex: Zeroizing::new(master.hex),
            accounts: HashMap::new(),
        })
    }

    /// Walks seed modifiers from `account_index`'s range until one yields an
    /// address of the requested type whose key passes the security check.
    /// Returns the account and the number of attempts it took.
    pub fn derive_account(
        &self,
        crypto: &dyn CryptoProvider,
        account_index: u64,
        address_type: AddressType,
    ) -> Result<(Account, u64)> {
        let max_attempts = BASE_DERIVATION_ATTEMPTS << address_type.zero_bits();
        let first_modifier = account_index.checked_mul(max_attempts).ok_or_else(|| {
            BlockchainError::Crypto(format!("Account index {account_index} out of range"))
        })?;

        for attempt in 0..max_attempts {
            let modifier = first_modifier + attempt;
            let seed_hex = Zeroizing::new(format!(
                "{}{modifier:0width$x}",
                self.master_hex.as_str(),
                width = SEED_MODIFIER_HEX_LEN
            ));
            if seed_hex.len() != ED25519_SEED_LEN * 2 {
                return Err(BlockchainError::Crypto(format!(
                    "Seed modifier {modifier} overflows {SEED_MODIFIER_HEX_LEN} hex chars"
                )));
            }
            let seed = Zeroizing::new(hex_decode(&seed_hex)?);
            let key_pair = crypto.key_pair_from_seed(&seed)?;

            let derived = crypto.derive_address(&key_pair.public_key_hex)?;
            if !derived.starts_with(address_type.prefix()) {
                continue;
            }
            let address = match Address::parse(&derived) {
                Ok(address) => address,
                Err(e) => {
                    warn!("Skipping derived address {derived}: {e}");
                    continue;
                }
            };
            if security_check(&address, &key_pair.public_key_hex).is_err() {
                continue;
            }

            debug!("Derived {address} after {} attempts", attempt + 1);
            let account = Account::new(key_pair.private_key, key_pair.public_key_hex, address);
            return Ok((account, attempt + 1));
        }

        Err(BlockchainError::Crypto(format!(
            "No {:?} address found for account {account_index} within {max_attempts} attempts",
            address_type
        )))
    }

    /// Derives accounts of `address_type` until `count` are held, and
    /// returns all of them
    pub fn derive_accounts(
        &mut self,
        crypto: &dyn CryptoProvider,
        count: usize,
        address_type: AddressType,
    ) -> Result<&[Account]> {
        let existing = self.accounts.get(&address_type).map_or(0, Vec::len);
        let mut derived = Vec::with_capacity(count.saturating_sub(existing));
        for index in existing..count {
            let (account, _) = self.derive_account(crypto, index as u64, address_type)?;
            derived.push(account);
        }

        let accounts = self.accounts.entry(address_type).or_default();
        accounts.extend(derived);
        Ok(&accounts[..count.min(accounts.len())])
    }

    pub fn get_accounts(&self, address_type: AddressType) -> &[Account] {
        self.accounts
            .get(&address_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
