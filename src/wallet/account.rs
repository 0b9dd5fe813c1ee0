use crate::core::{Transaction, TransactionIO};
use crate::crypto::CryptoProvider;
use crate::error::{BlockchainError, Result};
use crate::wallet::Address;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A signing key with its derived address and the outputs it can spend
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Account {
    private_key: Vec<u8>,
    #[zeroize(skip)]
    public_key_hex: String,
    #[zeroize(skip)]
    address: Address,
    #[zeroize(skip)]
    utxos: Vec<TransactionIO>,
}

impl Account {
    pub fn new(private_key: Vec<u8>, public_key_hex: String, address: Address) -> Account {
        Account {
            private_key,
            public_key_hex,
            address,
            utxos: Vec::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub fn utxos(&self) -> &[TransactionIO] {
        &self.utxos
    }

    pub fn balance(&self) -> u64 {
        self.utxos.iter().map(|utxo| utxo.amount).sum()
    }

    /// Replaces the cached outputs with the JSON array served by
    /// `FullNode::get_unspent_outputs`
    pub fn set_utxos_from_json(&mut self, utxos_json: &str) -> Result<()> {
        let utxos: Vec<TransactionIO> = serde_json::from_str(utxos_json)?;
        self.utxos = utxos;
        Ok(())
    }

    pub fn set_utxos(&mut self, utxos: Vec<TransactionIO>) {
        self.utxos = utxos;
    }

    /// Appends this account's `"<signature> <publicKey>"` witness
    pub fn sign_and_return_transaction(
        &self,
        crypto: &dyn CryptoProvider,
        mut transaction: Transaction,
    ) -> Result<Transaction> {
        let message = transaction.signing_message()?;
        let signature = crypto.sign(message.as_bytes(), &self.private_key)?;

        let already_signed = transaction
            .witnesses
            .iter()
            .any(|witness| witness.split(' ').next() == Some(signature.as_str()));
        if already_signed {
            return Err(BlockchainError::Crypto(format!(
                "Transaction {} already carries this signature",
                transaction.id
            )));
        }

        transaction
            .witnesses
            .push(format!("{signature} {}", self.public_key_hex));
        Ok(transaction)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("public_key_hex", &self.public_key_hex)
            .field("utxos", &self.utxos.len())
            .finish_non_exhaustive()
    }
}
