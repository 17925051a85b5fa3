//! Per-user 256-bit key material
//!
//! Keys are random bytes from the OS RNG, moved around as base64 text and
//! wiped from memory when dropped.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// A user's symmetric data key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_SIZE],
}

impl KeyMaterial {
    /// Generate a fresh key from the OS random number generator
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Decode key material from its base64 transport form
    ///
    /// Fails unless the text decodes to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> VaultResult<Self> {
        let mut decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| VaultError::Encryption(format!("Invalid key encoding: {}", e)))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(VaultError::Encryption(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_SIZE, len
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { key })
    }

    /// Encode the key for storage
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}
