//! Preference service
//!
//! One encrypted preferences document per user, keyed by user id.

use serde_json::{Map, Value};
use tracing::warn;

use crate::audit::EntityType;
use crate::error::{VaultError, VaultResult};
use crate::models::{Preferences, UserId};
use crate::vault::Vault;

pub struct PreferenceService<'a> {
    vault: &'a Vault,
}

impl<'a> PreferenceService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    fn fallback(&self) -> Preferences {
        Preferences::with_currency(self.vault.settings().default_currency.clone())
    }

    /// The user's preferences, or the configured defaults
    ///
    /// A document that can't be read or decrypted is logged and replaced by
    /// the defaults rather than failing the caller.
    pub fn get(&self, user_id: &UserId) -> Preferences {
        match self.load(user_id) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => self.fallback(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "could not read preferences, using defaults");
                self.fallback()
            }
        }
    }

    /// The stored preferences, without falling back
    pub fn load(&self, user_id: &UserId) -> VaultResult<Option<Preferences>> {
        match self
            .vault
            .storage()
            .preferences
            .get(user_id.as_str(), user_id)?
        {
            Some(row) => Ok(Some(self.vault.records().decrypt_preferences(row, user_id)?)),
            None => Ok(None),
        }
    }

    /// Merge `changes` into the stored document and save it
    pub fn update(&self, user_id: &UserId, changes: &Map<String, Value>) -> VaultResult<Preferences> {
        let current = self.load(user_id)?.unwrap_or_else(|| self.fallback());
        let merged = current
            .merged(changes)
            .map_err(|e| VaultError::Validation(format!("Invalid preferences: {}", e)))?;

        let row = self.vault.records().encrypt_preferences(&merged, user_id)?;
        let table = &self.vault.storage().preferences;
        let fields: Vec<String> = changes.keys().cloned().collect();

        if table.update(user_id.as_str(), user_id, row.clone())?.is_some() {
            self.vault.storage().log_update(
                EntityType::UserPreferences,
                user_id.to_string(),
                user_id,
                fields,
            );
        } else {
            table.insert(user_id, row)?;
            self.vault.storage().log_create(
                EntityType::UserPreferences,
                user_id.to_string(),
                user_id,
                fields,
            );
        }
        Ok(merged)
    }

    pub fn set_currency(&self, user_id: &UserId, currency: &str) -> VaultResult<Preferences> {
        let currency = currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(VaultError::Validation(format!(
                "Currency must be a three-letter code, got '{}'",
                currency
            )));
        }
        let mut changes = Map::new();
        changes.insert("currency".into(), Value::String(currency));
        self.update(user_id, &changes)
    }
}
