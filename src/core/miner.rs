use crate::core::{BlockData, ProofOfWork, Transaction, NONCE_BYTES};
use crate::crypto::{CryptoProvider, HashParams};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, hex_encode};
use crate::wallet::Address;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Outcome of one proof-of-work attempt. `is_valid` is advisory: the node
/// recomputes the hash before committing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningProposal {
    pub nonce: String,
    pub timestamp: i64,
    pub hash: String,
    pub is_valid: bool,
    pub coinbase: Transaction,
}

/// Searches nonces for a candidate, paying the reward to its own address.
/// Holds no chain state; every attempt works on a private copy.
pub struct Miner {
    address: Address,
    crypto: Arc<dyn CryptoProvider>,
    pow: ProofOfWork,
}

impl Miner {
    pub fn new(address: Address, crypto: Arc<dyn CryptoProvider>, pow_params: HashParams) -> Miner {
        let pow = ProofOfWork::new(Arc::clone(&crypto), pow_params);
        Miner {
            address,
            crypto,
            pow,
        }
    }

    pub fn get_address(&self) -> &Address {
        &self.address
    }

    /// One attempt: random nonce, fresh timestamp, coinbase paying
    /// `coinBase + fees`, then the block hash
    pub fn mine_pow(&self, candidate: &BlockData) -> Result<MiningProposal> {
        let nonce = hex_encode(&self.crypto.random_bytes(NONCE_BYTES));
        let coinbase = Transaction::new_coinbase(
            self.crypto.as_ref(),
            candidate.get_index(),
            &nonce,
            &self.address,
            candidate.coinbase_amount()?,
        )?;

        let mut block = candidate.clone();
        block.set_coinbase_transaction(coinbase.clone())?;
        let timestamp = current_timestamp()?;
        block.set_proof(&nonce, timestamp);

        let hash = self.pow.hash_block(&block)?;
        let is_valid = ProofOfWork::satisfies_difficulty(&hash.bits(), block.get_difficulty());

        Ok(MiningProposal {
            nonce,
            timestamp,
            hash: hash.hex,
            is_valid,
            coinbase,
        })
    }

    /// Repeats [`Miner::mine_pow`] until a hash satisfies the difficulty or
    /// `max_attempts` is spent
    pub fn mine_until_valid(
        &self,
        candidate: &BlockData,
        max_attempts: u64,
    ) -> Result<Option<MiningProposal>> {
        self.search(candidate, max_attempts, None)
    }

    /// Runs `workers` independent searches over the same candidate snapshot.
    /// The first worker to find a valid nonce stops the others.
    pub fn mine_parallel(
        &self,
        candidate: &BlockData,
        workers: usize,
        max_attempts_per_worker: u64,
    ) -> Result<Option<MiningProposal>> {
        let workers = workers.max(1);
        let found = AtomicBool::new(false);
        let found = &found;

        let results: Vec<Result<Option<MiningProposal>>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || self.search(candidate, max_attempts_per_worker, Some(found)))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(BlockchainError::Consensus("Mining worker panicked".to_string()))
                    })
                })
                .collect()
        });

        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some(proposal)) => return Ok(Some(proposal)),
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    fn search(
        &self,
        candidate: &BlockData,
        max_attempts: u64,
        stop: Option<&AtomicBool>,
    ) -> Result<Option<MiningProposal>> {
        for attempt in 1..=max_attempts {
            if stop.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Ok(None);
            }

            let proposal = self.mine_pow(candidate)?;
            if proposal.is_valid {
                if let Some(flag) = stop {
                    flag.store(true, Ordering::Relaxed);
                }
                info!(
                    "POW -> [index:{}] | Diff = {} | attempts = {attempt} | hash = {}",
                    candidate.get_index(),
                    candidate.get_difficulty(),
                    proposal.hash
                );
                return Ok(Some(proposal));
            }
        }

        debug!(
            "No valid nonce for block {} after {max_attempts} attempts",
            candidate.get_index()
        );
        Ok(None)
    }
}
