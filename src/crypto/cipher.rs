//! AES-256-GCM sealing of single field values
//!
//! A sealed value is the base64 (standard alphabet, padded) encoding of
//! `nonce(12) || ciphertext || tag(16)`. A fresh random nonce is drawn for
//! every call, so sealing the same plaintext twice gives different blobs.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{VaultError, VaultResult};

use super::KeyMaterial;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `key` and return the encoded blob
pub fn encrypt(plaintext: &[u8], key: &KeyMaterial) -> VaultResult<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(blob))
}

/// Decode and authenticate a blob produced by [`encrypt`]
pub fn decrypt(blob: &str, key: &KeyMaterial) -> VaultResult<Vec<u8>> {
    let raw = STANDARD
        .decode(blob)
        .map_err(|e| VaultError::Decryption(format!("Invalid ciphertext encoding: {}", e)))?;

    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::Decryption(format!(
            "Ciphertext too short: {} bytes",
            raw.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Decryption(format!("Failed to create cipher: {}", e)))?;

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        VaultError::Decryption("Decryption failed: invalid key or corrupted data".into())
    })
}
