use crate::config::Settings;
use crate::core::{
    BlockData, DifficultyAdjustment, ProofOfWork, Transaction, TxRole, Validator,
    GENESIS_PREV_HASH,
};
use crate::crypto::CryptoProvider;
use crate::error::{BlockchainError, Result};
use crate::storage::{BlockStore, BlockSummary, HotData, MemPool};
use crate::wallet::Address;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of a committed proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalOutcome {
    pub block: BlockData,
    pub next_candidate: BlockData,
}

/// Everything a block commit mutates, guarded by one lock so commits are
/// serialized
struct ChainState {
    chain: Vec<BlockData>,
    candidate: BlockData,
    hot_data: HotData,
}

/// Single node owning the chain, the ledger, the mempool and the candidate
/// block. Transactions are admitted concurrently; block commits run one at a
/// time and either apply everywhere or nowhere.
pub struct FullNode {
    settings: Settings,
    crypto: Arc<dyn CryptoProvider>,
    validator: Validator,
    pow: ProofOfWork,
    store: Arc<dyn BlockStore>,
    mem_pool: MemPool,
    state: Mutex<ChainState>,
}

impl FullNode {
    /// Replays the stored chain into a fresh ledger and builds the first
    /// candidate
    pub fn load(
        settings: Settings,
        crypto: Arc<dyn CryptoProvider>,
        store: Arc<dyn BlockStore>,
    ) -> Result<FullNode> {
        settings.validate()?;

        let chain = store.load_chain()?;
        verify_chain_linkage(&chain)?;

        let mut hot_data = HotData::new();
        hot_data.digest_chain(&chain)?;
        store.save_chain_summary(&BlockSummary::from_chain(&chain)?)?;

        let validator = Validator::new(Arc::clone(&crypto));
        let pow = ProofOfWork::new(Arc::clone(&crypto), settings.pow_hash.clone());
        let mem_pool = MemPool::new();
        let candidate = create_candidate(&settings, &chain, &hot_data, &mem_pool)?;

        info!(
            "Node loaded: {} blocks, candidate #{} at difficulty {}",
            chain.len(),
            candidate.get_index(),
            candidate.get_difficulty()
        );

        Ok(FullNode {
            settings,
            crypto,
            validator,
            pow,
            store,
            mem_pool,
            state: Mutex::new(ChainState {
                chain,
                candidate,
                hot_data,
            }),
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ChainState>> {
        self.state
            .lock()
            .map_err(|_| BlockchainError::Ledger("Node state lock poisoned".to_string()))
    }

    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get_crypto(&self) -> Arc<dyn CryptoProvider> {
        Arc::clone(&self.crypto)
    }

    pub fn get_mem_pool(&self) -> &MemPool {
        &self.mem_pool
    }

    /// Snapshot of the block being mined
    pub fn get_candidate(&self) -> Result<BlockData> {
        Ok(self.lock_state()?.candidate.clone())
    }

    /// Rebuilds the candidate from the current pool, e.g. after new
    /// transactions were admitted
    pub fn refresh_candidate(&self) -> Result<BlockData> {
        let mut state = self.lock_state()?;
        let candidate = create_candidate(
            &self.settings,
            &state.chain,
            &state.hot_data,
            &self.mem_pool,
        )?;
        state.candidate = candidate.clone();
        Ok(candidate)
    }

    /// Commits the candidate sealed with `nonce`, `timestamp` and the
    /// proposer's coinbase. The hash is always recomputed here. On any error
    /// the chain, the candidate, the ledger and the pool are left as they were.
    pub fn propose_block(
        &self,
        nonce: &str,
        timestamp: i64,
        coinbase: Transaction,
    ) -> Result<ProposalOutcome> {
        ProofOfWork::check_nonce(nonce)?;

        let mut state = self.lock_state()?;
        check_timestamp(state.chain.last(), timestamp)?;
        let mut block = state.candidate.clone();
        block.set_coinbase_transaction(coinbase)?;
        block.set_proof(nonce, timestamp);

        let hash = self.pow.hash_block(&block)?;
        if let Err(e) =
            ProofOfWork::verify_hash_conforms_to_difficulty(&hash.bits(), block.get_difficulty())
        {
            debug!("Proposal for block {} refused: {e}", block.get_index());
            return Err(e);
        }
        block.set_hash(hash.hex);

        self.validate_block_transactions(&block)?;

        // the live ledger is only replaced once the block is persisted
        let mut staged = state.hot_data.clone();
        if let Err(e) = staged.digest_block(&block) {
            error!("Ledger rejected block {}: {e}", block.get_index());
            return Err(e);
        }

        state.chain.push(block.clone());
        let next_candidate =
            match create_candidate(&self.settings, &state.chain, &staged, &self.mem_pool) {
                Ok(candidate) => candidate,
                Err(e) => {
                    state.chain.pop();
                    return Err(e);
                }
            };
        if let Err(e) = self.store.save_block(&block) {
            state.chain.pop();
            warn!("Block {} rolled back: {e}", block.get_index());
            return Err(e);
        }

        state.hot_data = staged;
        state.candidate = next_candidate.clone();
        self.mem_pool
            .digest_block_transactions(block.get_transactions());
        self.mem_pool.evict_unspendable(&state.hot_data);

        info!(
            "Block #{} committed | {} txs | difficulty {} | hash {}",
            block.get_index(),
            block.get_transactions().len(),
            block.get_difficulty(),
            block.get_hash().unwrap_or_default()
        );
        Ok(ProposalOutcome {
            block,
            next_candidate,
        })
    }

    /// Coinbase first, minting reward plus fees, then fully validated
    /// transfers that never spend the same output twice
    fn validate_block_transactions(&self, block: &BlockData) -> Result<()> {
        let txs = block.get_transactions();
        let Some(coinbase) = txs.first() else {
            return Err(BlockchainError::Structural(format!(
                "Block {} has no coinbase",
                block.get_index()
            )));
        };
        if coinbase.coinbase_height() != Some(block.get_index()) {
            return Err(BlockchainError::Structural(format!(
                "Coinbase {} was not minted for block {}",
                coinbase.id,
                block.get_index()
            )));
        }
        let minted = block.coinbase_amount()?;
        self.validator
            .validate_transaction(coinbase, TxRole::Coinbase { minted })?;

        let mut ids = HashSet::new();
        let mut spent = HashSet::new();
        for tx in txs {
            if !ids.insert(tx.id.as_str()) {
                return Err(BlockchainError::Structural(format!(
                    "Transaction {} appears twice in block {}",
                    tx.id,
                    block.get_index()
                )));
            }
        }
        for tx in &txs[1..] {
            self.validator.validate_transaction(tx, TxRole::Transfer)?;
            for utxo in tx.spent_outputs() {
                if !spent.insert(utxo) {
                    return Err(BlockchainError::Structural(format!(
                        "Output {}:{:?} is spent twice in block {}",
                        utxo.tx_id.as_deref().unwrap_or("?"),
                        utxo.index,
                        block.get_index()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Decodes a JSON transaction and runs pool admission. Returns the
    /// transaction id when accepted.
    pub fn submit_transaction(&self, transaction_bytes: &[u8]) -> Result<String> {
        let tx = match Transaction::from_json_bytes(transaction_bytes) {
            Ok(tx) => tx,
            Err(e) => {
                info!("[Tx_Refused] undecodable transaction: {e}");
                return Err(e);
            }
        };

        let id = tx.id.clone();
        let spendable = {
            let state = self.lock_state()?;
            tx.spent_outputs().all(|utxo| state.hot_data.is_unspent(utxo))
        };
        if !spendable {
            let e = BlockchainError::Structural(format!(
                "Transaction {id} spends an output that is not unspent"
            ));
            info!("[Tx_Refused] {id} ({}): {e}", e.category());
            return Err(e);
        }

        match self.mem_pool.push_transaction(tx, &self.validator) {
            Ok(()) => {
                info!("[Tx_Accepted] {id}");
                Ok(id)
            }
            Err(e) => {
                info!("[Tx_Refused] {id} ({}): {e}", e.category());
                Err(e)
            }
        }
    }

    /// JSON array of the committed unspent outputs of `address`
    pub fn get_unspent_outputs(&self, address: &str) -> Result<String> {
        let address = Address::parse(address)?;
        self.lock_state()?.hot_data.get_utxos_json(&address)
    }

    pub fn balance_of(&self, address: &Address) -> Result<i64> {
        Ok(self.lock_state()?.hot_data.get_balance(address))
    }

    pub fn chain_len(&self) -> Result<usize> {
        Ok(self.lock_state()?.chain.len())
    }

    pub fn last_block(&self) -> Result<Option<BlockData>> {
        Ok(self.lock_state()?.chain.last().cloned())
    }

    pub fn mem_pool_len(&self) -> usize {
        self.mem_pool.len()
    }

    pub fn block_summaries(&self) -> Result<Vec<BlockSummary>> {
        BlockSummary::from_chain(&self.lock_state()?.chain)
    }
}

/// Indexes must run 0, 1, 2... and every block must point at its
/// predecessor's hash
fn verify_chain_linkage(chain: &[BlockData]) -> Result<()> {
    let mut prev_hash = GENESIS_PREV_HASH;
    for (position, block) in chain.iter().enumerate() {
        if block.get_index() != position as u64 {
            return Err(BlockchainError::Ledger(format!(
                "Block at position {position} has index {}",
                block.get_index()
            )));
        }
        if block.get_prev_hash() != prev_hash {
            return Err(BlockchainError::Ledger(format!(
                "Block {} does not link to its predecessor",
                block.get_index()
            )));
        }
        prev_hash = block.get_hash().ok_or_else(|| {
            BlockchainError::Ledger(format!("Stored block {} has no hash", block.get_index()))
        })?;
    }
    Ok(())
}

/// Timestamps never go backwards, starting from the epoch
fn check_timestamp(last: Option<&BlockData>, timestamp: i64) -> Result<()> {
    let floor = last.and_then(BlockData::get_timestamp).unwrap_or(0);
    if timestamp < floor {
        return Err(BlockchainError::Consensus(format!(
            "Timestamp {timestamp} is before {floor}"
        )));
    }
    Ok(())
}

fn create_candidate(
    settings: &Settings,
    chain: &[BlockData],
    hot_data: &HotData,
    mem_pool: &MemPool,
) -> Result<BlockData> {
    let Some(last) = chain.last() else {
        return BlockData::genesis_candidate(&settings.consensus);
    };

    let mut txs = hot_data.select_spendable(mem_pool.get_all());
    txs.truncate(settings.mining.max_block_transactions);
    let difficulty = DifficultyAdjustment::calculate_next_difficulty(chain, &settings.consensus)?;
    BlockData::next_candidate(last, difficulty, txs, &settings.consensus)
}
