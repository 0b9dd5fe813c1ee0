// bincode 2 helpers used by the sled block store
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Rejects trailing bytes so a truncated or concatenated record never decodes silently
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(BlockchainError::Serialization(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BlockData, Transaction, GENESIS_PREV_HASH};
    use crate::storage::BlockSummary;
    use crate::testnet::{test_accounts, test_crypto};

    #[test]
    fn test_block_with_coinbase_survives_encoding() {
        let crypto = test_crypto();
        let accounts = test_accounts(1);
        let coinbase =
            Transaction::new_coinbase(crypto.as_ref(), 0, "00ff00ff00ff00ff", accounts[0].address(), 5)
                .unwrap();
        let block = BlockData::new(
            0,
            0,
            256_000_000,
            1,
            GENESIS_PREV_HASH.to_string(),
            vec![coinbase],
            27_000_000_000_000,
        )
        .unwrap();

        let bytes = serialize(&block).unwrap();
        let decoded: BlockData = deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let summary = BlockSummary {
            block_index: 3,
            coinbase_reward: 10,
            timestamp: 1_000,
            difficulty: 1,
            time_between_blocks: 0,
        };
        let mut bytes = serialize(&summary).unwrap();
        bytes.push(0);
        let result: Result<BlockSummary> = deserialize(&bytes);
        assert!(matches!(result, Err(BlockchainError::Serialization(_))));
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<BlockSummary> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }
}
