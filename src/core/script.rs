use crate::crypto::CryptoProvider;
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const SIGNATURE_V1: &str = "signature_v1";

/// Unlock condition of an output: `(crypto, signature_hex, message, public_key_hex)`
pub type LockScript = fn(&dyn CryptoProvider, &str, &str, &str) -> bool;

static LOCK_SCRIPTS: Lazy<HashMap<&'static str, LockScript>> = Lazy::new(|| {
    let mut scripts: HashMap<&'static str, LockScript> = HashMap::new();
    scripts.insert(SIGNATURE_V1, signature_v1);
    scripts
});

fn signature_v1(
    crypto: &dyn CryptoProvider,
    signature_hex: &str,
    message: &str,
    public_key_hex: &str,
) -> bool {
    crypto.verify(signature_hex, message.as_bytes(), public_key_hex)
}

pub fn get_lock_script(name: &str) -> Option<LockScript> {
    LOCK_SCRIPTS.get(name).copied()
}

pub fn is_known_script(name: &str) -> bool {
    LOCK_SCRIPTS.contains_key(name)
}
