use crate::error::{BlockchainError, Result};
use crate::utils::{
    argon2_digest, base58_encode, bits_string, ed25519_public_key, ed25519_sign, ed25519_verify,
    hex_decode, hex_encode, random_bytes, sha256_digest,
};
use crate::wallet::address::{self, AddressType, ADDRESS_LENGTH};
use serde::{Deserialize, Serialize};

/// Hex length of an Ed25519 public key
pub const PUBLIC_KEY_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashVariant {
    Argon2d,
    Argon2i,
    Argon2id,
}

impl HashVariant {
    fn algorithm(self) -> argon2::Algorithm {
        match self {
            HashVariant::Argon2d => argon2::Algorithm::Argon2d,
            HashVariant::Argon2i => argon2::Algorithm::Argon2i,
            HashVariant::Argon2id => argon2::Algorithm::Argon2id,
        }
    }
}

/// Cost parameters of one memory-hard hash use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
    pub time_cost: u32,
    pub memory_cost_kib: u32,
    pub parallelism: u32,
    pub variant: HashVariant,
    pub output_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            time_cost: 1,
            memory_cost_kib: 1_024,
            parallelism: 1,
            variant: HashVariant::Argon2id,
            output_len: 32,
        }
    }
}

impl HashParams {
    pub fn validate(&self) -> Result<()> {
        argon2::Params::new(
            self.memory_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(self.output_len),
        )
        .map(|_| ())
        .map_err(|e| BlockchainError::Config(format!("Invalid hash parameters: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOutput {
    pub bytes: Vec<u8>,
    pub hex: String,
}

impl HashOutput {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let hex = hex_encode(&bytes);
        Self { bytes, hex }
    }

    pub fn bits(&self) -> String {
        bits_string(&self.bytes)
    }
}

/// An Ed25519 key pair in the textual form used by witnesses
#[derive(Debug, Clone)]
pub struct KeyPairHex {
    pub private_key: Vec<u8>,
    pub public_key_hex: String,
}

/// Hashing, signing and address capabilities consumed by the ledger engine.
///
/// Every expensive call may block; callers never hold the node's commit lock
/// around pool admission work that goes through this trait.
pub trait CryptoProvider: Send + Sync {
    /// Memory-hard hash, used for proof-of-work and address derivation
    fn hash_password(&self, message: &[u8], salt: &[u8], params: &HashParams)
        -> Result<HashOutput>;

    /// Fast hash, used for transaction ids. Returns lowercase hex.
    fn fast_hash(&self, message: &[u8]) -> String;

    /// Signs `message` with a private seed. Returns the signature as hex.
    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<String>;

    fn verify(&self, signature_hex: &str, message: &[u8], public_key_hex: &str) -> bool;

    /// Address text derived from a public key. The result is not guaranteed
    /// to carry a recognized type prefix.
    fn derive_address(&self, public_key_hex: &str) -> Result<String>;

    fn key_pair_from_seed(&self, seed: &[u8]) -> Result<KeyPairHex>;

    fn random_bytes(&self, len: usize) -> Vec<u8>;

    fn check_address_format(&self, address: &str) -> Result<AddressType> {
        address::conformity_check(address)
    }
}

/// Argon2 + Ed25519 + SHA-256 provider
#[derive(Debug, Clone)]
pub struct StandardCrypto {
    address_params: HashParams,
}

impl StandardCrypto {
    pub fn new(address_params: HashParams) -> Self {
        Self { address_params }
    }
}

impl CryptoProvider for StandardCrypto {
    fn hash_password(
        &self,
        message: &[u8],
        salt: &[u8],
        params: &HashParams,
    ) -> Result<HashOutput> {
        let bytes = argon2_digest(
            params.variant.algorithm(),
            message,
            salt,
            params.time_cost,
            params.memory_cost_kib,
            params.parallelism,
            params.output_len,
        )?;
        Ok(HashOutput::from_bytes(bytes))
    }

    fn fast_hash(&self, message: &[u8]) -> String {
        hex_encode(&sha256_digest(message))
    }

    fn sign(&self, message: &[u8], private_key: &[u8]) -> Result<String> {
        Ok(hex_encode(&ed25519_sign(private_key, message)?))
    }

    fn verify(&self, signature_hex: &str, message: &[u8], public_key_hex: &str) -> bool {
        let (Ok(signature), Ok(public_key)) = (hex_decode(signature_hex), hex_decode(public_key_hex))
        else {
            return false;
        };
        ed25519_verify(&public_key, &signature, message)
    }

    fn derive_address(&self, public_key_hex: &str) -> Result<String> {
        if public_key_hex.len() != PUBLIC_KEY_HEX_LEN || hex_decode(public_key_hex).is_err() {
            return Err(BlockchainError::Crypto(format!(
                "Cannot derive an address from public key {public_key_hex:?}"
            )));
        }

        // the first half carries less entropy, so it only salts the hash
        let (salt, message) = public_key_hex.split_at(PUBLIC_KEY_HEX_LEN / 2);
        let digest = self.hash_password(message.as_bytes(), salt.as_bytes(), &self.address_params)?;
        Ok(base58_encode(&digest.bytes)
            .chars()
            .take(ADDRESS_LENGTH)
            .collect())
    }

    fn key_pair_from_seed(&self, seed: &[u8]) -> Result<KeyPairHex> {
        let public_key = ed25519_public_key(seed)?;
        Ok(KeyPairHex {
            private_key: seed.to_vec(),
            public_key_hex: hex_encode(&public_key),
        })
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        random_bytes(len)
    }
}
