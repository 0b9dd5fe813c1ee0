// Transactions follow a UTXO model: a transfer spends committed outputs and
// creates new ones, a coinbase mints the block reward from a single nonce input.

use crate::core::monetary::TRANSFER_FEE;
use crate::core::script::{is_known_script, SIGNATURE_V1};
use crate::crypto::CryptoProvider;
use crate::error::{BlockchainError, Result};
use crate::utils::hex_encode;
use crate::wallet::{Account, Address};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const TX_IO_VERSION: u32 = 1;

/// An output being created, or a committed output being spent
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct TransactionIO {
    pub amount: u64,
    pub address: Address,
    pub script: String,
    pub version: u32,
    /// Id of the transaction that created this output, stamped at commit
    #[serde(rename = "TxID", default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    /// Position of this output in its transaction, stamped at commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl TransactionIO {
    pub fn new(amount: u64, address: Address, script: &str, version: u32) -> Result<TransactionIO> {
        let output = TransactionIO {
            amount,
            address,
            script: script.to_string(),
            version,
            tx_id: None,
            index: None,
        };
        output.check_fields()?;
        Ok(output)
    }

    /// Amount, script and version rules shared by the builder and the validator
    pub fn check_fields(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(BlockchainError::Structural(
                "Invalid amount value: 0".to_string(),
            ));
        }
        if self.script.is_empty() {
            return Err(BlockchainError::Structural("Empty script".to_string()));
        }
        if !is_known_script(&self.script) {
            return Err(BlockchainError::Structural(format!(
                "Unknown script {}",
                self.script
            )));
        }
        if self.version == 0 {
            return Err(BlockchainError::Structural(
                "Invalid version value: 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Committed copy of an output, as held by the ledger
    pub fn committed(&self, tx_id: &str, index: u32) -> TransactionIO {
        TransactionIO {
            tx_id: Some(tx_id.to_string()),
            index: Some(index),
            ..self.clone()
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(untagged)]
pub enum TxInput {
    /// `<nonce>:<block index>` of a coinbase transaction
    Coinbase(String),
    Spend(TransactionIO),
}

impl TxInput {
    pub fn as_spend(&self) -> Option<&TransactionIO> {
        match self {
            TxInput::Spend(utxo) => Some(utxo),
            TxInput::Coinbase(_) => None,
        }
    }
}

/// A payment requested from the transfer builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub recipient: Address,
    pub amount: u64,
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Transaction {
    pub id: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TransactionIO>,
    /// `"<signature> <publicKey>"`, one per signer
    #[serde(default)]
    pub witnesses: Vec<String>,
}

impl Transaction {
    /// Mints `amount` to `miner_address` at height `block_index`. The height
    /// is part of the nonce input, so no two blocks share a coinbase id.
    pub fn new_coinbase(
        crypto: &dyn CryptoProvider,
        block_index: u64,
        nonce_hex: &str,
        miner_address: &Address,
        amount: u64,
    ) -> Result<Transaction> {
        if nonce_hex.is_empty() {
            return Err(BlockchainError::Structural(
                "Coinbase nonce must not be empty".to_string(),
            ));
        }

        let output = TransactionIO::new(amount, miner_address.clone(), SIGNATURE_V1, TX_IO_VERSION)?;
        let mut tx = Transaction {
            id: String::new(),
            inputs: vec![TxInput::Coinbase(format!("{nonce_hex}:{block_index}"))],
            outputs: vec![output],
            witnesses: vec![],
        };
        tx.id = tx.compute_id(crypto)?;
        Ok(tx)
    }

    /// Spends `utxos` into one output per transfer, paying [`TRANSFER_FEE`].
    /// Positive change goes back to the first input's address.
    pub fn create_transfer_transaction(
        crypto: &dyn CryptoProvider,
        utxos: &[TransactionIO],
        transfers: &[Transfer],
    ) -> Result<Transaction> {
        if utxos.is_empty() {
            return Err(BlockchainError::Structural("No UTXO to spend".to_string()));
        }
        if transfers.is_empty() {
            return Err(BlockchainError::Structural("No transfer to make".to_string()));
        }

        let mut outpoints = HashSet::new();
        for utxo in utxos {
            let Some(tx_id) = utxo.tx_id.as_deref() else {
                return Err(BlockchainError::Structural(format!(
                    "UTXO of {} to {} was never committed (missing TxID)",
                    utxo.amount, utxo.address
                )));
            };
            if !outpoints.insert((tx_id, utxo.index)) {
                return Err(BlockchainError::Structural(format!(
                    "UTXO {tx_id}:{:?} is spent twice",
                    utxo.index
                )));
            }
        }

        let mut outputs = Vec::with_capacity(transfers.len() + 1);
        let mut total_spent: u64 = 0;
        for transfer in transfers {
            outputs.push(TransactionIO::new(
                transfer.amount,
                transfer.recipient.clone(),
                SIGNATURE_V1,
                TX_IO_VERSION,
            )?);
            total_spent = total_spent
                .checked_add(transfer.amount)
                .ok_or_else(|| BlockchainError::Economic("Transfer total overflows".to_string()))?;
        }

        let available = sum_amounts(utxos.iter())?;
        let required = total_spent
            .checked_add(TRANSFER_FEE)
            .ok_or_else(|| BlockchainError::Economic("Transfer total overflows".to_string()))?;
        if available < required {
            return Err(BlockchainError::InsufficientFunds {
                required,
                available,
            });
        }

        let change = available - required;
        if change > 0 {
            outputs.push(TransactionIO::new(
                change,
                utxos[0].address.clone(),
                SIGNATURE_V1,
                TX_IO_VERSION,
            )?);
        }

        let mut seen = HashSet::new();
        if !outputs.iter().all(|output| seen.insert(output)) {
            return Err(BlockchainError::Structural("Duplicate outputs".to_string()));
        }

        let mut tx = Transaction {
            id: String::new(),
            inputs: utxos.iter().cloned().map(TxInput::Spend).collect(),
            outputs,
            witnesses: vec![],
        };
        tx.id = tx.compute_id(crypto)?;
        Ok(tx)
    }

    /// Builds a single transfer from `sender`'s cached outputs and signs it
    pub fn create_and_sign_transfer(
        crypto: &dyn CryptoProvider,
        sender: &Account,
        amount: u64,
        recipient: &Address,
    ) -> Result<Transaction> {
        let transfer = Transfer {
            recipient: recipient.clone(),
            amount,
        };
        let tx = Self::create_transfer_transaction(crypto, sender.utxos(), &[transfer])?;
        sender.sign_and_return_transaction(crypto, tx)
    }

    /// Lowercase hex of `json(inputs) ++ json(outputs)`. This is both the id
    /// preimage and the message every witness signs.
    pub fn signing_message(&self) -> Result<String> {
        let inputs = serde_json::to_string(&self.inputs)?;
        let outputs = serde_json::to_string(&self.outputs)?;
        Ok(hex_encode(format!("{inputs}{outputs}").as_bytes()))
    }

    pub fn compute_id(&self, crypto: &dyn CryptoProvider) -> Result<String> {
        Ok(crypto.fast_hash(self.signing_message()?.as_bytes()))
    }

    /// True only for the single-nonce-input transaction at position 0 of a block
    pub fn is_coinbase_transaction(&self, position_in_block: usize) -> bool {
        position_in_block == 0
            && self.inputs.len() == 1
            && matches!(self.inputs[0], TxInput::Coinbase(_))
    }

    /// Height a coinbase was minted for, read back from its nonce input
    pub fn coinbase_height(&self) -> Option<u64> {
        match self.inputs.as_slice() {
            [TxInput::Coinbase(nonce)] => nonce.rsplit_once(':')?.1.parse().ok(),
            _ => None,
        }
    }

    pub fn spent_outputs(&self) -> impl Iterator<Item = &TransactionIO> {
        self.inputs.iter().filter_map(TxInput::as_spend)
    }

    pub fn output_total(&self) -> Result<u64> {
        sum_amounts(self.outputs.iter())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Transaction> {
        serde_json::from_slice(bytes).map_err(|e| {
            BlockchainError::Structural(format!("Malformed transaction encoding: {e}"))
        })
    }
}

pub(crate) fn sum_amounts<'a>(mut ios: impl Iterator<Item = &'a TransactionIO>) -> Result<u64> {
    ios.try_fold(0u64, |total, io| {
        total
            .checked_add(io.amount)
            .ok_or_else(|| BlockchainError::Economic("Amount total overflows".to_string()))
    })
}
