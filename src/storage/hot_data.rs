use crate::core::{BlockData, Transaction, TransactionIO, TxInput};
use crate::error::{BlockchainError, Result};
use crate::wallet::Address;
use log::{debug, error};
use std::collections::{HashMap, HashSet};

/// Balances and unspent outputs per address, rebuilt by replaying the chain.
///
/// This is a derived index: after every block the sum of all balances must
/// equal the emitted supply, anything else means the ledger or the chain is
/// corrupt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotData {
    address_utxos: HashMap<Address, HashSet<TransactionIO>>,
    address_balances: HashMap<Address, i64>,
}

impl HotData {
    pub fn new() -> HotData {
        HotData::default()
    }

    /// Replays `blocks` in order. Either every block applies or the ledger
    /// is left untouched.
    pub fn digest_chain(&mut self, blocks: &[BlockData]) -> Result<()> {
        let mut staged = self.clone();
        for block in blocks {
            staged.apply_block(block, false)?;
        }
        *self = staged;
        Ok(())
    }

    /// Replays one block, then asserts the supply invariant. On error the
    /// ledger is left untouched.
    pub fn digest_block(&mut self, block: &BlockData) -> Result<()> {
        let mut staged = self.clone();
        staged.apply_block(block, true)?;
        *self = staged;
        Ok(())
    }

    fn apply_block(&mut self, block: &BlockData, log_summary: bool) -> Result<()> {
        for tx in block.get_transactions() {
            self.digest_transaction(tx)?;
        }

        let expected = i128::from(block.supply_after());
        let total = self.total_balance();
        if total != expected {
            let message = format!(
                "Balances sum to {total} after block {}, expected supply {expected}",
                block.get_index()
            );
            error!("{message}");
            return Err(BlockchainError::Ledger(message));
        }

        if log_summary {
            if let Some(coinbase) = block.get_transactions().first() {
                for output in &coinbase.outputs {
                    debug!(
                        "Block {} digested | {} balance: {}",
                        block.get_index(),
                        output.address,
                        self.get_balance(&output.address)
                    );
                }
            }
        }
        Ok(())
    }

    fn digest_transaction(&mut self, tx: &Transaction) -> Result<()> {
        for input in &tx.inputs {
            // coinbase inputs carry only a nonce
            let TxInput::Spend(utxo) = input else {
                continue;
            };
            self.spend(tx, utxo)?;
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            let index = u32::try_from(index).map_err(|_| {
                BlockchainError::Ledger(format!("Transaction {} has too many outputs", tx.id))
            })?;
            let committed = output.committed(&tx.id, index);
            let amount = amount_as_i64(committed.amount)?;
            let address = committed.address.clone();

            if !self
                .address_utxos
                .entry(address.clone())
                .or_default()
                .insert(committed)
            {
                return Err(BlockchainError::Ledger(format!(
                    "Output {}:{index} is already unspent",
                    tx.id
                )));
            }
            *self.address_balances.entry(address).or_insert(0) += amount;
        }
        Ok(())
    }

    fn spend(&mut self, tx: &Transaction, utxo: &TransactionIO) -> Result<()> {
        let removed = self
            .address_utxos
            .get_mut(&utxo.address)
            .is_some_and(|utxos| utxos.remove(utxo));
        if !removed {
            return Err(BlockchainError::Ledger(format!(
                "Transaction {} spends {}:{:?} which is not unspent for {}",
                tx.id,
                utxo.tx_id.as_deref().unwrap_or("?"),
                utxo.index,
                utxo.address
            )));
        }

        let amount = amount_as_i64(utxo.amount)?;
        *self.address_balances.entry(utxo.address.clone()).or_insert(0) -= amount;

        if self
            .address_utxos
            .get(&utxo.address)
            .is_some_and(HashSet::is_empty)
        {
            self.address_utxos.remove(&utxo.address);
            self.address_balances.remove(&utxo.address);
        }
        Ok(())
    }

    pub fn get_balance(&self, address: &Address) -> i64 {
        self.address_balances.get(address).copied().unwrap_or(0)
    }

    /// Unspent outputs of `address`, ordered by transaction id then index
    pub fn get_utxos(&self, address: &Address) -> Vec<TransactionIO> {
        let mut utxos: Vec<TransactionIO> = self
            .address_utxos
            .get(address)
            .map(|utxos| utxos.iter().cloned().collect())
            .unwrap_or_default();
        utxos.sort_by(|a, b| (&a.tx_id, a.index).cmp(&(&b.tx_id, b.index)));
        utxos
    }

    pub fn get_utxos_json(&self, address: &Address) -> Result<String> {
        Ok(serde_json::to_string(&self.get_utxos(address))?)
    }

    pub fn is_unspent(&self, utxo: &TransactionIO) -> bool {
        self.address_utxos
            .get(&utxo.address)
            .is_some_and(|utxos| utxos.contains(utxo))
    }

    pub fn total_balance(&self) -> i128 {
        self.address_balances
            .values()
            .map(|balance| i128::from(*balance))
            .sum()
    }

    /// Keeps the transactions whose inputs are all unspent and not already
    /// consumed by an earlier kept transaction
    pub fn select_spendable(&self, txs: Vec<Transaction>) -> Vec<Transaction> {
        let mut consumed: HashSet<TransactionIO> = HashSet::new();
        let mut selected = Vec::with_capacity(txs.len());

        for tx in txs {
            let spendable = tx
                .spent_outputs()
                .all(|utxo| self.is_unspent(utxo) && !consumed.contains(utxo));
            let distinct = {
                let mut own = HashSet::new();
                tx.spent_outputs().all(|utxo| own.insert(utxo))
            };
            if !spendable || !distinct {
                debug!("Leaving transaction {} out of the candidate", tx.id);
                continue;
            }
            consumed.extend(tx.spent_outputs().cloned());
            selected.push(tx);
        }
        selected
    }
}

fn amount_as_i64(amount: u64) -> Result<i64> {
    i64::try_from(amount)
        .map_err(|_| BlockchainError::Ledger(format!("Amount {amount} overflows the ledger")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transfer, TRANSFER_FEE};
    use crate::testnet::{committed_block, committed_utxo, test_accounts, test_crypto};

    #[test]
    fn test_coinbase_credits_miner() {
        let crypto = test_crypto();
        let accounts = test_accounts(1);
        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "0011223344556677", accounts[0].address(), 500)
                .unwrap();
        let block = committed_block(0, 0, 500, vec![coinbase.clone()]);

        let mut ledger = HotData::new();
        ledger.digest_block(&block).unwrap();

        assert_eq!(ledger.get_balance(accounts[0].address()), 500);
        let utxos = ledger.get_utxos(accounts[0].address());
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].tx_id.as_deref(), Some(coinbase.id.as_str()));
        assert_eq!(utxos[0].index, Some(0));
    }

    #[test]
    fn test_transfer_moves_value() {
        let crypto = test_crypto();
        let accounts = test_accounts(3);
        let (miner, alice, bob) = (&accounts[0], &accounts[1], &accounts[2]);

        let genesis_coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "0011223344556677", alice.address(), 10_000_000)
                .unwrap();
        let genesis = committed_block(0, 0, 10_000_000, vec![genesis_coinbase]);
        let mut ledger = HotData::new();
        ledger.digest_block(&genesis).unwrap();

        let transfer = Transfer {
            recipient: bob.address().clone(),
            amount: 4_000_000,
        };
        let tx = Transaction::create_transfer_transaction(
            crypto.as_ref(),
            &ledger.get_utxos(alice.address()),
            &[transfer],
        )
        .unwrap();
        let coinbase = Transaction::new_coinbase(
            crypto.as_ref(),
            1,
            "8899aabbccddeeff",
            miner.address(),
            1_000 + TRANSFER_FEE,
        )
        .unwrap();
        let block = committed_block(1, 10_000_000, 1_000, vec![coinbase, tx]);
        ledger.digest_block(&block).unwrap();

        assert_eq!(ledger.get_balance(alice.address()), 5_000_000);
        assert_eq!(ledger.get_balance(bob.address()), 4_000_000);
        assert_eq!(ledger.get_balance(miner.address()), 1_001_000);
        assert_eq!(ledger.total_balance(), 10_001_000);
    }

    #[test]
    fn test_missing_utxo_is_fatal_and_leaves_ledger_untouched() {
        let crypto = test_crypto();
        let accounts = test_accounts(2);

        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "0011223344556677", accounts[0].address(), 300)
                .unwrap();
        let mut ledger = HotData::new();
        ledger
            .digest_block(&committed_block(0, 0, 300, vec![coinbase]))
            .unwrap();
        let before = ledger.clone();

        let phantom = committed_utxo(accounts[0].address(), 10_000_000, "ffff", 0);
        let transfer = Transfer {
            recipient: accounts[1].address().clone(),
            amount: 2_000_000,
        };
        let tx = Transaction::create_transfer_transaction(crypto.as_ref(), &[phantom], &[transfer])
            .unwrap();
        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 1, "8899aabbccddeeff", accounts[0].address(), 300)
                .unwrap();
        let block = committed_block(1, 300, 300, vec![coinbase, tx]);

        let err = ledger.digest_block(&block).unwrap_err();
        assert!(matches!(err, BlockchainError::Ledger(_)));
        assert!(err.is_fatal());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_supply_mismatch_is_fatal() {
        let crypto = test_crypto();
        let accounts = test_accounts(1);
        // the coinbase mints more than the block declares
        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "0011223344556677", accounts[0].address(), 301)
                .unwrap();

        let mut ledger = HotData::new();
        let result = ledger.digest_block(&committed_block(0, 0, 300, vec![coinbase]));
        assert!(matches!(result, Err(BlockchainError::Ledger(_))));
        assert_eq!(ledger, HotData::new());
    }

    #[test]
    fn test_digest_chain_is_reproducible() {
        let crypto = test_crypto();
        let accounts = test_accounts(2);
        let blocks: Vec<BlockData> = (0..3u64)
            .map(|i| {
                let coinbase = Transaction::new_coinbase(
                    crypto.as_ref(),
                    i,
                    &format!("{i:016x}"),
                    accounts[(i % 2) as usize].address(),
                    100,
                )
                .unwrap();
                committed_block(i, i * 100, 100, vec![coinbase])
            })
            .collect();

        let mut first = HotData::new();
        first.digest_chain(&blocks).unwrap();
        let mut second = HotData::new();
        second.digest_chain(&blocks).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.get_balance(accounts[0].address()), 200);
        assert_eq!(first.get_balance(accounts[1].address()), 100);
    }

    #[test]
    fn test_select_spendable_drops_conflicts() {
        let crypto = test_crypto();
        let accounts = test_accounts(3);
        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "0011223344556677", accounts[0].address(), 10_000_000)
                .unwrap();
        let mut ledger = HotData::new();
        ledger
            .digest_block(&committed_block(0, 0, 10_000_000, vec![coinbase]))
            .unwrap();
        let utxos = ledger.get_utxos(accounts[0].address());

        let pay = |recipient: &Address, amount| {
            Transaction::create_transfer_transaction(
                crypto.as_ref(),
                &utxos,
                &[Transfer {
                    recipient: recipient.clone(),
                    amount,
                }],
            )
            .unwrap()
        };
        let first = pay(accounts[1].address(), 2_000_000);
        let conflicting = pay(accounts[2].address(), 3_000_000);
        let phantom = Transaction::create_transfer_transaction(
            crypto.as_ref(),
            &[committed_utxo(accounts[0].address(), 5_000_000, "ee", 1)],
            &[Transfer {
                recipient: accounts[1].address().clone(),
                amount: 1_000_000,
            }],
        )
        .unwrap();

        let selected = ledger.select_spendable(vec![first.clone(), conflicting, phantom]);
        assert_eq!(selected, vec![first]);
    }

    #[test]
    fn test_utxos_json() {
        let crypto = test_crypto();
        let accounts = test_accounts(1);
        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "0011223344556677", accounts[0].address(), 70)
                .unwrap();
        let mut ledger = HotData::new();
        ledger
            .digest_block(&committed_block(0, 0, 70, vec![coinbase.clone()]))
            .unwrap();

        let json = ledger.get_utxos_json(accounts[0].address()).unwrap();
        assert!(json.contains(&format!(r#""TxID":"{}""#, coinbase.id)));
        assert!(json.contains(r#""index":0"#));
    }
}
