use crate::core::{Transaction, TxRole, Validator};
use crate::error::{BlockchainError, Result};
use crate::storage::HotData;
use log::{debug, error};
use std::collections::HashSet;
use std::sync::RwLock;

/// Pending transactions in arrival order
pub struct MemPool {
    inner: RwLock<Vec<Transaction>>,
}

impl Default for MemPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemPool {
    pub fn new() -> MemPool {
        MemPool {
            inner: RwLock::new(vec![]),
        }
    }

    /// The first `max_count` pooled transactions.
    // TODO: order by fee once transactions can pay more than the fixed fee
    pub fn get_most_lucrative_transactions(&self, max_count: usize) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.iter().take(max_count).cloned().collect(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                Vec::new()
            }
        }
    }

    /// Drops every pooled transaction whose id appears in `txs`
    pub fn digest_block_transactions(&self, txs: &[Transaction]) {
        let ids: HashSet<&str> = txs.iter().map(|tx| tx.id.as_str()).collect();
        match self.inner.write() {
            Ok(mut pool) => {
                let before = pool.len();
                pool.retain(|tx| !ids.contains(tx.id.as_str()));
                debug!("Removed {} mined transactions from the pool", before - pool.len());
            }
            Err(_) => {
                error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    /// Drops every pooled transaction spending an output the ledger no
    /// longer holds
    pub fn evict_unspendable(&self, hot_data: &HotData) {
        match self.inner.write() {
            Ok(mut pool) => {
                let before = pool.len();
                pool.retain(|tx| tx.spent_outputs().all(|utxo| hot_data.is_unspent(utxo)));
                let evicted = before - pool.len();
                if evicted > 0 {
                    debug!("Evicted {evicted} stale transactions from the pool");
                }
            }
            Err(_) => {
                error!("Failed to acquire write lock on memory pool");
            }
        }
    }

    /// Full admission: duplicate check, the five validation stages, then a
    /// second duplicate check under the write lock. The pool is only touched
    /// by the final insert.
    pub fn push_transaction(&self, tx: Transaction, validator: &Validator) -> Result<()> {
        if self.contains(&tx.id) {
            return Err(duplicate(&tx));
        }

        // no lock is held across validation
        validator.validate_transaction(&tx, TxRole::Transfer)?;

        let mut pool = self.inner.write().map_err(|_| {
            BlockchainError::Persistence("Failed to acquire write lock on memory pool".to_string())
        })?;
        if pool.iter().any(|pooled| pooled.id == tx.id) {
            return Err(duplicate(&tx));
        }
        debug!("Transaction {} admitted to the pool", tx.id);
        pool.push(tx);
        Ok(())
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.iter().any(|tx| tx.id == tx_id),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                error!("Failed to acquire read lock on memory pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.get_most_lucrative_transactions(usize::MAX)
    }
}

fn duplicate(tx: &Transaction) -> BlockchainError {
    BlockchainError::Structural(format!("Transaction {} is already pooled", tx.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transfer;
    use crate::testnet::{committed_block, committed_utxo, test_accounts, test_crypto};
    use crate::wallet::Account;
    use std::sync::Arc;
    use std::thread;

    fn transfer(accounts: &[Account], tx_id: &str, amount: u64) -> Result<Transaction> {
        let crypto = test_crypto();
        let utxo = committed_utxo(accounts[0].address(), 10_000_000, tx_id, 0);
        let transfer = Transfer {
            recipient: accounts[1].address().clone(),
            amount,
        };
        let tx = Transaction::create_transfer_transaction(crypto.as_ref(), &[utxo], &[transfer])?;
        accounts[0].sign_and_return_transaction(crypto.as_ref(), tx)
    }

    #[test]
    fn test_transfer_without_change_is_admitted() {
        let accounts = test_accounts(2);
        let validator = Validator::new(test_crypto());
        let pool = MemPool::new();

        let tx = transfer(&accounts, "aa", 9_000_000).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        pool.push_transaction(tx.clone(), &validator).unwrap();

        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&tx.id));
    }

    #[test]
    fn test_fee_below_constant_is_insufficient_funds() {
        let accounts = test_accounts(2);
        let result = transfer(&accounts, "aa", 9_900_000);
        assert_eq!(
            result,
            Err(BlockchainError::InsufficientFunds {
                required: 10_900_000,
                available: 10_000_000,
            })
        );
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let accounts = test_accounts(2);
        let validator = Validator::new(test_crypto());
        let pool = MemPool::new();

        let tx = transfer(&accounts, "aa", 9_000_000).unwrap();
        pool.push_transaction(tx.clone(), &validator).unwrap();
        let result = pool.push_transaction(tx, &validator);

        assert!(matches!(result, Err(BlockchainError::Structural(_))));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_transaction_leaves_pool_untouched() {
        let accounts = test_accounts(2);
        let validator = Validator::new(test_crypto());
        let pool = MemPool::new();

        let mut tx = transfer(&accounts, "aa", 9_000_000).unwrap();
        tx.witnesses.clear();
        assert!(pool.push_transaction(tx, &validator).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_prefix_and_block_digestion() {
        let accounts = test_accounts(2);
        let validator = Validator::new(test_crypto());
        let pool = MemPool::new();

        let txs: Vec<Transaction> = ["aa", "bb", "cc"]
            .iter()
            .map(|id| transfer(&accounts, id, 8_000_000).unwrap())
            .collect();
        for tx in &txs {
            pool.push_transaction(tx.clone(), &validator).unwrap();
        }

        assert_eq!(pool.get_most_lucrative_transactions(2), txs[..2].to_vec());
        pool.digest_block_transactions(&txs[..2]);
        assert_eq!(pool.get_all(), vec![txs[2].clone()]);
    }

    #[test]
    fn test_stale_transactions_are_evicted() {
        let crypto = test_crypto();
        let accounts = test_accounts(2);
        let validator = Validator::new(test_crypto());
        let pool = MemPool::new();

        let coinbase = Transaction::new_coinbase(
            crypto.as_ref(),
            0,
            "0011223344556677",
            accounts[0].address(),
            10_000_000,
        )
        .unwrap();
        let mut ledger = HotData::new();
        ledger
            .digest_block(&committed_block(0, 0, 10_000_000, vec![coinbase.clone()]))
            .unwrap();

        let live = transfer(&accounts, &coinbase.id, 9_000_000).unwrap();
        let stale = transfer(&accounts, "dead", 9_000_000).unwrap();
        pool.push_transaction(stale, &validator).unwrap();
        pool.push_transaction(live.clone(), &validator).unwrap();

        pool.evict_unspendable(&ledger);
        assert_eq!(pool.get_all(), vec![live]);
    }

    #[test]
    fn test_concurrent_admission_of_same_transaction() {
        let accounts = test_accounts(2);
        let validator = Validator::new(test_crypto());
        let pool = Arc::new(MemPool::new());
        let tx = transfer(&accounts, "aa", 9_000_000).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let validator = validator.clone();
                let tx = tx.clone();
                thread::spawn(move || pool.push_transaction(tx, &validator).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 1);
        assert_eq!(pool.len(), 1);
    }
}
