use crate::config::Settings;
use crate::core::{BlockData, Transaction, TransactionIO, GENESIS_PREV_HASH, MAX_SUPPLY, SIGNATURE_V1};
use crate::crypto::{CryptoProvider, HashParams, HashVariant, StandardCrypto};
use crate::wallet::{Account, Address, AddressType, Wallet};
use once_cell::sync::Lazy;
use std::sync::Arc;

const TEST_MNEMONIC: &str = "ff00ff00ff00ff00ff00ff00ff00ff00";

/// Accounts derived once and shared by every test
const CACHED_ACCOUNTS: usize = 4;

fn light_hash(output_len: usize) -> HashParams {
    HashParams {
        time_cost: 1,
        memory_cost_kib: 8,
        parallelism: 1,
        variant: HashVariant::Argon2id,
        output_len,
    }
}

/// Default consensus rules with 8 KiB Argon2 everywhere
pub fn test_settings() -> Settings {
    Settings {
        pow_hash: light_hash(32),
        address_hash: light_hash(16),
        wallet_hash: light_hash(26),
        ..Settings::default()
    }
}

pub fn test_crypto() -> Arc<dyn CryptoProvider> {
    Arc::new(StandardCrypto::new(test_settings().address_hash))
}

static ACCOUNTS: Lazy<Vec<Account>> = Lazy::new(|| {
    let crypto = test_crypto();
    let mut wallet = Wallet::restore(crypto.as_ref(), TEST_MNEMONIC, &test_settings().wallet_hash)
        .expect("test wallet");
    let accounts = wallet
        .derive_accounts(crypto.as_ref(), CACHED_ACCOUNTS, AddressType::Weak)
        .expect("test accounts")
        .to_vec();
    accounts
});

/// The first `count` deterministic test accounts
pub fn test_accounts(count: usize) -> Vec<Account> {
    assert!(count <= CACHED_ACCOUNTS, "only {CACHED_ACCOUNTS} test accounts");
    ACCOUNTS[..count].to_vec()
}

/// An output as the ledger holds it once committed
pub fn committed_utxo(address: &Address, amount: u64, tx_id: &str, index: u32) -> TransactionIO {
    TransactionIO {
        amount,
        address: address.clone(),
        script: SIGNATURE_V1.to_string(),
        version: 1,
        tx_id: Some(tx_id.to_string()),
        index: Some(index),
    }
}

fn fake_hash(index: u64) -> String {
    format!("{index:064x}")
}

fn prev_hash(index: u64) -> String {
    match index {
        0 => GENESIS_PREV_HASH.to_string(),
        i => fake_hash(i - 1),
    }
}

/// A sealed block with a fake hash, carrying `txs` as given
pub fn committed_block(index: u64, supply: u64, coin_base: u64, txs: Vec<Transaction>) -> BlockData {
    let mut block = BlockData::new(index, supply, coin_base, 1, prev_hash(index), txs, MAX_SUPPLY)
        .expect("test block");
    block.set_proof("00000000", index as i64 * 1_000);
    block.set_hash(fake_hash(index));
    block
}

/// `len` linked empty blocks at `difficulty`, `interval_ms` apart
pub fn synthetic_chain(len: u64, difficulty: u32, interval_ms: i64) -> Vec<BlockData> {
    let reward = Settings::default().consensus.block_reward;
    (0..len)
        .map(|index| {
            let mut block = BlockData::new(
                index,
                index * reward,
                reward,
                difficulty,
                prev_hash(index),
                vec![],
                MAX_SUPPLY,
            )
            .expect("synthetic block");
            block.set_proof("00000000", index as i64 * interval_ms);
            block.set_hash(fake_hash(index));
            block
        })
        .collect()
}
