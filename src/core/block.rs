use crate::config::ConsensusParams;
use crate::core::monetary::next_coinbase_reward;
use crate::core::transaction::Transaction;
use crate::core::validation::{TxRole, Validator};
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, hex_encode, serialize};
use serde::{Deserialize, Serialize};

/// `prevHash` of the genesis block
pub const GENESIS_PREV_HASH: &str = "ContrastGenesisBlock";

pub const GENESIS_DIFFICULTY: u32 = 1;

/// A committed block, or the candidate being mined. The proof-of-work fields
/// stay unset on a fresh candidate.
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
pub struct BlockData {
    index: u64,
    /// Emission strictly before this block
    supply: u64,
    #[serde(rename = "coinBase")]
    coin_base: u64,
    difficulty: u32,
    #[serde(rename = "prevHash")]
    prev_hash: String,
    #[serde(rename = "Txs")]
    txs: Vec<Transaction>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

impl BlockData {
    pub fn new(
        index: u64,
        supply: u64,
        coin_base: u64,
        difficulty: u32,
        prev_hash: String,
        txs: Vec<Transaction>,
        max_supply: u64,
    ) -> Result<BlockData> {
        if difficulty < 1 {
            return Err(BlockchainError::Structural(format!(
                "Block {index} has difficulty {difficulty} < 1"
            )));
        }
        let emitted = supply.checked_add(coin_base);
        if emitted.map_or(true, |total| total > max_supply) {
            return Err(BlockchainError::Economic(format!(
                "Block {index} would emit past max supply: {supply} + {coin_base} > {max_supply}"
            )));
        }

        Ok(BlockData {
            index,
            supply,
            coin_base,
            difficulty,
            prev_hash,
            txs,
            timestamp: None,
            hash: None,
            nonce: None,
        })
    }

    pub fn genesis_candidate(params: &ConsensusParams) -> Result<BlockData> {
        BlockData::new(
            0,
            0,
            params.block_reward.min(params.max_supply),
            GENESIS_DIFFICULTY,
            GENESIS_PREV_HASH.to_string(),
            vec![],
            params.max_supply,
        )
    }

    /// Candidate following the committed block `last`
    pub fn next_candidate(
        last: &BlockData,
        difficulty: u32,
        txs: Vec<Transaction>,
        params: &ConsensusParams,
    ) -> Result<BlockData> {
        let hash = last.hash.clone().ok_or_else(|| {
            BlockchainError::Structural(format!("Block {} has no hash", last.index))
        })?;
        let supply = last.supply_after();
        let coin_base = next_coinbase_reward(last.index, supply, params);

        BlockData::new(
            last.index + 1,
            supply,
            coin_base,
            difficulty,
            hash,
            txs,
            params.max_supply,
        )
    }

    pub fn deserialize(bytes: &[u8]) -> Result<BlockData> {
        deserialize::<BlockData>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_supply(&self) -> u64 {
        self.supply
    }

    pub fn get_coin_base(&self) -> u64 {
        self.coin_base
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.txs.as_slice()
    }

    pub fn get_timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn get_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn get_nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Supply once this block is committed
    pub fn supply_after(&self) -> u64 {
        self.supply.saturating_add(self.coin_base)
    }

    /// Stamps a proof-of-work attempt. Any previous hash is discarded.
    pub fn set_proof(&mut self, nonce: &str, timestamp: i64) {
        self.nonce = Some(nonce.to_string());
        self.timestamp = Some(timestamp);
        self.hash = None;
    }

    pub(crate) fn set_hash(&mut self, hash: String) {
        self.hash = Some(hash);
    }

    /// Puts `coinbase` at position 0, replacing any coinbase already there
    pub fn set_coinbase_transaction(&mut self, coinbase: Transaction) -> Result<()> {
        if !coinbase.is_coinbase_transaction(0) {
            return Err(BlockchainError::Structural(format!(
                "Transaction {} is not a coinbase transaction",
                coinbase.id
            )));
        }

        self.remove_existing_coinbase_transaction();
        self.txs.insert(0, coinbase);
        Ok(())
    }

    pub fn remove_existing_coinbase_transaction(&mut self) {
        if self
            .txs
            .first()
            .is_some_and(|tx| tx.is_coinbase_transaction(0))
        {
            self.txs.remove(0);
        }
    }

    /// Sum of the fees paid by every transaction after the coinbase
    pub fn total_fees(&self) -> Result<u64> {
        self.txs
            .iter()
            .enumerate()
            .filter(|(position, tx)| !tx.is_coinbase_transaction(*position))
            .try_fold(0u64, |total, (_, tx)| {
                let fee = Validator::calculate_remaining_amount(tx, TxRole::Transfer)?;
                total
                    .checked_add(fee)
                    .ok_or_else(|| BlockchainError::Economic("Block fees overflow".to_string()))
            })
    }

    /// What the coinbase of this block may mint: reward plus fees
    pub fn coinbase_amount(&self) -> Result<u64> {
        self.coin_base
            .checked_add(self.total_fees()?)
            .ok_or_else(|| BlockchainError::Economic("Coinbase amount overflows".to_string()))
    }

    /// Hex of the fields covered by the proof-of-work hash
    pub fn signature_message(&self) -> Result<String> {
        let timestamp = self.timestamp.ok_or_else(|| {
            BlockchainError::Structural(format!("Block {} has no timestamp", self.index))
        })?;
        let tx_ids: String = self.txs.iter().map(|tx| tx.id.as_str()).collect();

        let message = format!(
            "{}{}{}{}{}{}{}",
            self.prev_hash, timestamp, self.index, self.supply, self.difficulty, tx_ids, self.coin_base
        );
        Ok(hex_encode(message.as_bytes()))
    }
}
