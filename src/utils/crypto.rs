use argon2::{Algorithm, Argon2, Params, Version};
use data_encoding::HEXLOWER;
use rand::RngCore;
use ring::digest::{Context, SHA256};
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of an Ed25519 private seed in bytes
pub const ED25519_SEED_LEN: usize = 32;

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn argon2_digest(
    algorithm: Algorithm,
    password: &[u8],
    salt: &[u8],
    time_cost: u32,
    memory_cost_kib: u32,
    parallelism: u32,
    output_len: usize,
) -> Result<Vec<u8>> {
    let params = Params::new(memory_cost_kib, time_cost, parallelism, Some(output_len))
        .map_err(|e| BlockchainError::Crypto(format!("Invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(algorithm, Version::V0x13, params);

    let mut output = vec![0u8; output_len];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| BlockchainError::Crypto(format!("Argon2 hashing failed: {e}")))?;
    Ok(output)
}

pub fn hex_encode(data: &[u8]) -> String {
    HEXLOWER.encode(data)
}

pub fn hex_decode(data: &str) -> Result<Vec<u8>> {
    HEXLOWER
        .decode(data.as_bytes())
        .map_err(|e| BlockchainError::Structural(format!("Invalid hex encoding: {e}")))
}

/// Big-endian bit string of `data`, one '0'/'1' char per bit
pub fn bits_string(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:08b}")).collect()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Returns the public key for an Ed25519 private seed
pub fn ed25519_public_key(seed: &[u8]) -> Result<Vec<u8>> {
    let key_pair = ed25519_key_pair(seed)?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ed25519_sign(seed: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let key_pair = ed25519_key_pair(seed)?;
    Ok(key_pair.sign(message).as_ref().to_vec())
}

pub fn ed25519_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key = UnparsedPublicKey::new(&ED25519, public_key);
    peer_public_key.verify(message, signature).is_ok()
}

fn ed25519_key_pair(seed: &[u8]) -> Result<Ed25519KeyPair> {
    if seed.len() != ED25519_SEED_LEN {
        return Err(BlockchainError::Crypto(format!(
            "Private key must be {ED25519_SEED_LEN} bytes, got {}",
            seed.len()
        )));
    }
    Ed25519KeyPair::from_seed_unchecked(seed)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to load Ed25519 key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex_encode(&sha256_digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_bits_string() {
        assert_eq!(bits_string(&[0x0f, 0x80]), "0000111110000000");
        assert_eq!(bits_string(&[]), "");
    }

    #[test]
    fn test_hex_decode_rejects_garbage() {
        assert_eq!(hex_decode("00ff").unwrap(), vec![0x00, 0xff]);
        assert!(hex_decode("0g").is_err());
        assert!(hex_decode("abc").is_err());
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let seed = [7u8; ED25519_SEED_LEN];
        let public_key = ed25519_public_key(&seed).unwrap();
        let signature = ed25519_sign(&seed, b"message").unwrap();

        assert!(ed25519_verify(&public_key, &signature, b"message"));
        assert!(!ed25519_verify(&public_key, &signature, b"other message"));
        assert!(ed25519_sign(&seed[..16], b"message").is_err());
    }

    #[test]
    fn test_argon2_digest_is_deterministic() {
        let first = argon2_digest(Algorithm::Argon2id, b"pass", b"saltsalt", 1, 8, 1, 16).unwrap();
        let second = argon2_digest(Algorithm::Argon2id, b"pass", b"saltsalt", 1, 8, 1, 16).unwrap();
        let other = argon2_digest(Algorithm::Argon2id, b"pass", b"saltsal2", 1, 8, 1, 16).unwrap();

        assert_eq!(first.len(), 16);
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_argon2_rejects_short_salt() {
        let result = argon2_digest(Algorithm::Argon2id, b"pass", b"salt", 1, 8, 1, 16);
        assert!(matches!(result, Err(BlockchainError::Crypto(_))));
    }
}
