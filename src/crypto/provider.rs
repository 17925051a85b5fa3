//! Key-resolving encrypt/decrypt entry points
//!
//! [`CryptoProvider`] turns a user id into key material (cache first, then
//! the key store, provisioning a missing key once) and seals or opens text
//! and numbers under it.
//!
//! Empty input passes through unchanged in both directions, so an empty
//! string column is stored as an empty string rather than a blob.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::KeyCacheSettings;
use crate::error::{VaultError, VaultResult};
use crate::models::UserId;
use crate::storage::KeyStore;

use super::{cipher, KeyCache, KeyMaterial};

/// Encrypts and decrypts field values under each user's key
pub struct CryptoProvider {
    keys: Arc<dyn KeyStore>,
    cache: KeyCache,
}

impl CryptoProvider {
    pub fn new(keys: Arc<dyn KeyStore>, cache: KeyCache) -> Self {
        Self { keys, cache }
    }

    pub fn from_settings(keys: Arc<dyn KeyStore>, settings: &KeyCacheSettings) -> Self {
        Self::new(keys, KeyCache::from_settings(settings))
    }

    /// Resolve the user's key
    ///
    /// A missing key is provisioned once and fetched again. If that fails
    /// too the caller gets [`VaultError::KeyUnavailable`].
    pub fn resolve_key(&self, user_id: &UserId) -> VaultResult<Arc<KeyMaterial>> {
        if let Some(key) = self.cache.get(user_id) {
            return Ok(key);
        }

        let key = match self.keys.get_user_key(user_id) {
            Ok(key) => key,
            Err(VaultError::KeyNotFound { .. }) => self.provision(user_id)?,
            Err(e) => return Err(e),
        };

        let key = Arc::new(key);
        self.cache.put(user_id, Arc::clone(&key));
        debug!(user_id = %user_id, "cached encryption key");
        Ok(key)
    }

    fn provision(&self, user_id: &UserId) -> VaultResult<KeyMaterial> {
        warn!(user_id = %user_id, "no encryption key on record, provisioning one");

        match self.keys.create_user_key(user_id) {
            // another caller won the race, its key is what we want
            Ok(()) | Err(VaultError::DuplicateKey { .. }) => {}
            Err(e) => {
                return Err(VaultError::KeyUnavailable {
                    user_id: user_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        self.keys
            .get_user_key(user_id)
            .map_err(|e| VaultError::KeyUnavailable {
                user_id: user_id.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn encrypt_string(&self, value: &str, user_id: &UserId) -> VaultResult<String> {
        if value.is_empty() {
            return Ok(String::new());
        }
        let key = self.resolve_key(user_id)?;
        cipher::encrypt(value.as_bytes(), &key)
    }

    pub fn decrypt_string(&self, blob: &str, user_id: &UserId) -> VaultResult<String> {
        if blob.is_empty() {
            return Ok(String::new());
        }
        let key = self.resolve_key(user_id)?;
        let plaintext = cipher::decrypt(blob, &key)?;
        String::from_utf8(plaintext)
            .map_err(|_| VaultError::Decryption("Plaintext is not valid UTF-8".into()))
    }

    /// Encrypt a number via its shortest round-trip decimal text
    pub fn encrypt_number(&self, value: f64, user_id: &UserId) -> VaultResult<String> {
        if !value.is_finite() {
            return Err(VaultError::Encryption(
                "Refusing to encrypt a non-finite number".into(),
            ));
        }
        self.encrypt_string(&format_number(value), user_id)
    }

    /// Decrypt a number, failing if the plaintext is not a finite decimal
    pub fn decrypt_number(&self, blob: &str, user_id: &UserId) -> VaultResult<f64> {
        let text = self.decrypt_string(blob, user_id)?;
        parse_number(&text)
    }

    /// Encrypt each value in order, failing on the first error
    pub fn batch_encrypt_strings(
        &self,
        values: &[&str],
        user_id: &UserId,
    ) -> VaultResult<Vec<String>> {
        values
            .iter()
            .map(|v| self.encrypt_string(v, user_id))
            .collect()
    }

    /// Decrypt each blob in order, failing on the first error
    pub fn batch_decrypt_strings(
        &self,
        blobs: &[&str],
        user_id: &UserId,
    ) -> VaultResult<Vec<String>> {
        blobs
            .iter()
            .map(|b| self.decrypt_string(b, user_id))
            .collect()
    }

    /// Drop a user's cached key, e.g. after the key row is deleted
    pub fn forget_user(&self, user_id: &UserId) {
        self.cache.invalidate(user_id);
    }

    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }
}

/// Canonical text for a number: shortest decimal that parses back exactly
pub fn format_number(value: f64) -> String {
    // Display never uses exponent notation and always round-trips
    let text = value.to_string();
    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}

/// Parse decrypted numeric text
pub fn parse_number(text: &str) -> VaultResult<f64> {
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(VaultError::Decryption(
            "Decrypted value is not a number".into(),
        )),
    }
}
