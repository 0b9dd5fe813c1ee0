use crate::core::BlockData;
use crate::crypto::{CryptoProvider, HashOutput, HashParams};
use crate::error::{BlockchainError, Result};
use log::trace;
use std::sync::Arc;

/// Nonces shorter than this cannot salt the memory-hard hash
pub const MIN_NONCE_HEX_LEN: usize = 8;

/// Random bytes drawn by miners for each attempt
pub const NONCE_BYTES: usize = 8;

/// Difficulty points per required leading zero bit
const DIFFICULTY_PER_ZERO_BIT: u32 = 16;

/// Bits read after the leading zeros to check the fractional part
const ADJUST_BITS: usize = 5;

/// Memory-hard block hashing and the difficulty rule it must satisfy
#[derive(Clone)]
pub struct ProofOfWork {
    crypto: Arc<dyn CryptoProvider>,
    params: HashParams,
}

impl ProofOfWork {
    pub fn new(crypto: Arc<dyn CryptoProvider>, params: HashParams) -> ProofOfWork {
        ProofOfWork { crypto, params }
    }

    pub fn check_nonce(nonce: &str) -> Result<()> {
        if nonce.len() < MIN_NONCE_HEX_LEN {
            return Err(BlockchainError::Structural(format!(
                "Nonce {nonce:?} is shorter than {MIN_NONCE_HEX_LEN} hex chars"
            )));
        }
        if !nonce.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(BlockchainError::Structural(format!(
                "Nonce {nonce:?} is not lowercase hex"
            )));
        }
        Ok(())
    }

    /// Hashes the block's signature message salted with its nonce
    pub fn hash_block(&self, block: &BlockData) -> Result<HashOutput> {
        let nonce = block.get_nonce().ok_or_else(|| {
            BlockchainError::Structural(format!("Block {} has no nonce", block.get_index()))
        })?;
        Self::check_nonce(nonce)?;

        let message = block.signature_message()?;
        self.crypto
            .hash_password(message.as_bytes(), nonce.as_bytes(), &self.params)
    }

    /// Splits a difficulty into (leading zero bits, 5-bit threshold)
    pub fn get_diff_and_adjust(difficulty: u32) -> (usize, u32) {
        let zeros = (difficulty / DIFFICULTY_PER_ZERO_BIT) as usize;
        let adjust = difficulty % DIFFICULTY_PER_ZERO_BIT;
        (zeros, adjust)
    }

    pub fn verify_hash_conforms_to_difficulty(bits: &str, difficulty: u32) -> Result<()> {
        if difficulty < 1 {
            return Err(BlockchainError::Consensus(format!(
                "Invalid difficulty {difficulty} < 1"
            )));
        }
        if difficulty as usize > bits.len() {
            return Err(BlockchainError::Consensus(format!(
                "Difficulty {difficulty} exceeds the {} hash bits",
                bits.len()
            )));
        }

        let (zeros, adjust) = Self::get_diff_and_adjust(difficulty);
        if !bits.chars().take(zeros).all(|bit| bit == '0') {
            return Err(BlockchainError::Consensus(format!(
                "Hash does not start with {zeros} zero bits"
            )));
        }

        let end = (zeros + ADJUST_BITS).min(bits.len());
        let next_bits = bits.get(zeros..end).unwrap_or_default();
        let value = if next_bits.is_empty() {
            0
        } else {
            u32::from_str_radix(next_bits, 2).map_err(|e| {
                BlockchainError::Consensus(format!("Hash bits {next_bits:?} are not binary: {e}"))
            })?
        };
        if value < adjust {
            return Err(BlockchainError::Consensus(format!(
                "Hash bits {next_bits} are below the threshold {adjust}"
            )));
        }

        trace!("Hash satisfies difficulty {difficulty} ({zeros} zeros, adjust {adjust})");
        Ok(())
    }

    pub fn satisfies_difficulty(bits: &str, difficulty: u32) -> bool {
        Self::verify_hash_conforms_to_difficulty(bits, difficulty).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusParams;
    use crate::testnet::{test_crypto, test_settings};

    #[test]
    fn test_diff_and_adjust() {
        assert_eq!(ProofOfWork::get_diff_and_adjust(1), (0, 1));
        assert_eq!(ProofOfWork::get_diff_and_adjust(16), (1, 0));
        assert_eq!(ProofOfWork::get_diff_and_adjust(35), (2, 3));
    }

    #[test]
    fn test_difficulty_one() {
        // zeros = 0, the first five bits must be >= 1
        let bits = format!("00001{}", "0".repeat(251));
        assert!(ProofOfWork::satisfies_difficulty(&bits, 1));
        let bits = "0".repeat(256);
        assert!(!ProofOfWork::satisfies_difficulty(&bits, 1));
    }

    #[test]
    fn test_zeros_and_threshold() {
        // d = 35: two zero bits then 5 bits >= 3
        let ok = format!("0000011{}", "1".repeat(249));
        let low = format!("0000010{}", "1".repeat(249));
        let no_zeros = format!("1000011{}", "1".repeat(249));

        assert!(ProofOfWork::satisfies_difficulty(&ok, 35));
        assert!(!ProofOfWork::satisfies_difficulty(&low, 35));
        assert!(!ProofOfWork::satisfies_difficulty(&no_zeros, 35));
    }

    #[test]
    fn test_invalid_difficulties() {
        let bits = "1".repeat(8);
        assert!(matches!(
            ProofOfWork::verify_hash_conforms_to_difficulty(&bits, 0),
            Err(BlockchainError::Consensus(_))
        ));
        assert!(matches!(
            ProofOfWork::verify_hash_conforms_to_difficulty(&bits, 9),
            Err(BlockchainError::Consensus(_))
        ));
    }

    #[test]
    fn test_nonce_checks() {
        assert!(ProofOfWork::check_nonce("0011aabb").is_ok());
        assert!(ProofOfWork::check_nonce("0011aab").is_err());
        assert!(ProofOfWork::check_nonce("0011AABB").is_err());
        assert!(ProofOfWork::check_nonce("0011zzbb").is_err());
    }

    #[test]
    fn test_hash_block_is_deterministic() {
        let pow = ProofOfWork::new(test_crypto(), test_settings().pow_hash);
        let mut block = BlockData::genesis_candidate(&ConsensusParams::default()).unwrap();
        assert!(pow.hash_block(&block).is_err());

        block.set_proof("0011223344556677", 1_000);
        let first = pow.hash_block(&block).unwrap();
        let second = pow.hash_block(&block).unwrap();
        assert_eq!(first, second);

        block.set_proof("0011223344556678", 1_000);
        assert_ne!(pow.hash_block(&block).unwrap(), first);
    }
}
