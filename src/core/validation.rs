//! Transaction validation pipeline
//!
//! Five stages of increasing cost, run strictly in order, each one
//! short-circuiting the rest:
//!
//! 1. structural conformity of every input and output
//! 2. balance and fee rules
//! 3. id integrity (content hash)
//! 4. lock script execution against the witnesses
//! 5. ownership: witness keys must derive every input address
//!
//! No stage mutates the transaction or any shared state.

use crate::core::script::get_lock_script;
use crate::core::transaction::{sum_amounts, Transaction, TransactionIO, TxInput};
use crate::crypto::CryptoProvider;
use crate::error::{BlockchainError, Result};
use crate::wallet::{security_check, Address};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What a transaction is expected to be at its position in a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRole {
    /// Block reward transaction minting `minted` (reward plus collected fees)
    Coinbase { minted: u64 },
    Transfer,
}

impl TxRole {
    pub fn is_coinbase(&self) -> bool {
        matches!(self, TxRole::Coinbase { .. })
    }
}

/// Splits a `"<signature> <publicKey>"` witness
pub fn parse_witness(witness: &str) -> Result<(&str, &str)> {
    let mut parts = witness.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(signature), Some(public_key), None)
            if !signature.is_empty() && !public_key.is_empty() =>
        {
            Ok((signature, public_key))
        }
        _ => Err(BlockchainError::Structural(format!(
            "Malformed witness {witness:?}"
        ))),
    }
}

#[derive(Clone)]
pub struct Validator {
    crypto: Arc<dyn CryptoProvider>,
}

impl Validator {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Validator {
        Validator { crypto }
    }

    /// Runs every stage that applies to `role` and returns the fee
    pub fn validate_transaction(&self, tx: &Transaction, role: TxRole) -> Result<u64> {
        self.is_conform_transaction(tx, role)?;
        let fee = Self::calculate_remaining_amount(tx, role)?;
        self.control_transaction_hash(tx)?;

        if !role.is_coinbase() {
            self.execute_transaction_inputs_scripts(tx)?;
            self.address_ownership_confirmation(tx)?;
        }

        debug!("Transaction {} passed validation (fee {fee})", tx.id);
        Ok(fee)
    }

    /// Stage 1
    pub fn is_conform_transaction(&self, tx: &Transaction, role: TxRole) -> Result<()> {
        if tx.id.is_empty() {
            return Err(BlockchainError::Structural("Missing transaction id".to_string()));
        }
        if tx.outputs.is_empty() {
            return Err(BlockchainError::Structural(format!(
                "Transaction {} has no output",
                tx.id
            )));
        }

        match role {
            TxRole::Coinbase { .. } => match tx.inputs.as_slice() {
                [TxInput::Coinbase(nonce)] if !nonce.is_empty() => {}
                _ => {
                    return Err(BlockchainError::Structural(format!(
                        "Coinbase {} must have a single nonce input",
                        tx.id
                    )))
                }
            },
            TxRole::Transfer => {
                if tx.inputs.is_empty() {
                    return Err(BlockchainError::Structural(format!(
                        "Transaction {} has no input",
                        tx.id
                    )));
                }
                for input in &tx.inputs {
                    let TxInput::Spend(utxo) = input else {
                        return Err(BlockchainError::Structural(format!(
                            "Transaction {} mixes a coinbase nonce into its inputs",
                            tx.id
                        )));
                    };
                    self.check_io(utxo)?;
                    if utxo.tx_id.as_deref().map_or(true, str::is_empty) {
                        return Err(BlockchainError::Structural(format!(
                            "Input of {} to {} is missing its TxID",
                            utxo.amount, utxo.address
                        )));
                    }
                }
                if tx.witnesses.is_empty() {
                    return Err(BlockchainError::Structural(format!(
                        "Transaction {} carries no witness",
                        tx.id
                    )));
                }
            }
        }

        for output in &tx.outputs {
            self.check_io(output)?;
            if output.tx_id.is_some() || output.index.is_some() {
                return Err(BlockchainError::Structural(format!(
                    "Output of {} to {} is already linked to a transaction",
                    output.amount, output.address
                )));
            }
        }
        for witness in &tx.witnesses {
            parse_witness(witness)?;
        }
        Ok(())
    }

    fn check_io(&self, io: &TransactionIO) -> Result<()> {
        io.check_fields()?;
        self.crypto.check_address_format(io.address.as_str())?;
        Ok(())
    }

    /// Stage 2: `fee = inputs - outputs`. A coinbase's input side is the
    /// amount it is allowed to mint, so its fee must be exactly 0.
    pub fn calculate_remaining_amount(tx: &Transaction, role: TxRole) -> Result<u64> {
        let inputs_amount = match role {
            TxRole::Coinbase { minted } => minted,
            TxRole::Transfer => sum_amounts(tx.spent_outputs())?,
        };
        let outputs_amount = tx.output_total()?;

        let fee = inputs_amount.checked_sub(outputs_amount).ok_or_else(|| {
            BlockchainError::Economic(format!(
                "Negative transaction {}: outputs {outputs_amount} exceed inputs {inputs_amount}",
                tx.id
            ))
        })?;

        match role {
            TxRole::Coinbase { minted } if fee != 0 => Err(BlockchainError::Economic(format!(
                "Coinbase {} pays {outputs_amount}, expected {minted}",
                tx.id
            ))),
            TxRole::Transfer if fee == 0 => Err(BlockchainError::Economic(format!(
                "Transaction {} pays no fee",
                tx.id
            ))),
            _ => Ok(fee),
        }
    }

    /// Stage 3
    pub fn control_transaction_hash(&self, tx: &Transaction) -> Result<()> {
        let expected = tx.compute_id(self.crypto.as_ref())?;
        if expected != tx.id {
            return Err(BlockchainError::Crypto(format!(
                "Invalid transaction hash: {} should be {expected}",
                tx.id
            )));
        }
        Ok(())
    }

    /// Stage 4: every distinct (address, script) pair of the inputs is
    /// unlocked with the first witness; extra witnesses must also sign the
    /// canonical message.
    pub fn execute_transaction_inputs_scripts(&self, tx: &Transaction) -> Result<()> {
        let first_witness = tx.witnesses.first().ok_or_else(|| {
            BlockchainError::Structural(format!("Transaction {} carries no witness", tx.id))
        })?;
        let (signature, public_key) = parse_witness(first_witness)?;
        let message = tx.signing_message()?;

        let mut passed: HashSet<(&Address, &str)> = HashSet::new();
        for utxo in tx.spent_outputs() {
            if !passed.insert((&utxo.address, utxo.script.as_str())) {
                continue;
            }
            let script = get_lock_script(&utxo.script).ok_or_else(|| {
                BlockchainError::Structural(format!("Unknown script {}", utxo.script))
            })?;
            if !script(self.crypto.as_ref(), signature, &message, public_key) {
                return Err(BlockchainError::Crypto(format!(
                    "Script {} rejected the witness for {}",
                    utxo.script, utxo.address
                )));
            }
        }

        for witness in tx.witnesses.iter().skip(1) {
            let (signature, public_key) = parse_witness(witness)?;
            if !self
                .crypto
                .verify(signature, message.as_bytes(), public_key)
            {
                return Err(BlockchainError::Crypto(format!(
                    "Invalid signature from witness key {public_key}"
                )));
            }
        }
        Ok(())
    }

    /// Stage 5
    pub fn address_ownership_confirmation(&self, tx: &Transaction) -> Result<()> {
        let mut witness_keys: HashMap<String, &str> = HashMap::new();
        for witness in &tx.witnesses {
            let (_, public_key) = parse_witness(witness)?;
            let derived = self.crypto.derive_address(public_key)?;
            if witness_keys.insert(derived, public_key).is_some() {
                return Err(BlockchainError::Crypto(format!(
                    "Duplicate witness in transaction {}",
                    tx.id
                )));
            }
        }

        for utxo in tx.spent_outputs() {
            let public_key = witness_keys.get(utxo.address.as_str()).ok_or_else(|| {
                BlockchainError::Crypto(format!("Witness missing for address {}", utxo.address))
            })?;
            security_check(&utxo.address, public_key)?;
        }
        Ok(())
    }
}
