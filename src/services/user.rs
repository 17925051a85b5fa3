//! User lifecycle: key provisioning and erasure

use tracing::info;

use crate::audit::{AuditEntry, EntityType};
use crate::error::{VaultError, VaultResult};
use crate::models::UserId;
use crate::storage::KeyStore;
use crate::vault::Vault;

/// Rows removed by [`UserService::erase`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErasureReport {
    pub accounts: usize,
    pub transactions: usize,
    pub loans: usize,
    pub recurring: usize,
    pub preferences: usize,
    pub key_deleted: bool,
}

impl ErasureReport {
    pub fn total_rows(&self) -> usize {
        self.accounts + self.transactions + self.loans + self.recurring + self.preferences
    }
}

pub struct UserService<'a> {
    vault: &'a Vault,
}

impl<'a> UserService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Make sure the user has a key, returning whether one was created
    ///
    /// Called at sign-in; the crypto layer would also create one lazily on
    /// first use.
    pub fn ensure_key(&self, user_id: &UserId) -> VaultResult<bool> {
        let keys = &self.vault.storage().keys;
        if keys.exists(user_id)? {
            return Ok(false);
        }
        match keys.create_user_key(user_id) {
            Ok(()) => {
                self.vault.storage().log_create(
                    EntityType::EncryptionKey,
                    user_id.to_string(),
                    user_id,
                    Vec::new(),
                );
                info!(user_id = %user_id, "provisioned encryption key");
                Ok(true)
            }
            Err(VaultError::DuplicateKey { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The user's most recent audit entries, oldest first
    ///
    /// Empty when auditing is disabled.
    pub fn history(&self, user_id: &UserId, limit: usize) -> VaultResult<Vec<AuditEntry>> {
        let Some(audit) = self.vault.storage().audit() else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<AuditEntry> = audit
            .read_all()?
            .into_iter()
            .filter(|entry| &entry.user_id == user_id)
            .collect();
        let start = entries.len().saturating_sub(limit);
        Ok(entries.split_off(start))
    }

    /// Delete everything the user owns, key last
    ///
    /// Once the key is gone any ciphertext left behind (backups, copies) is
    /// unreadable.
    pub fn erase(&self, user_id: &UserId) -> VaultResult<ErasureReport> {
        let storage = self.vault.storage();

        let accounts = storage.list_account_ids(user_id)?;
        let report = ErasureReport {
            transactions: storage.transactions.delete_owned_by(user_id)?,
            recurring: storage.recurring.delete_owned_by(user_id)?,
            loans: storage.loans.delete_owned_by(user_id)?,
            preferences: storage.preferences.delete_owned_by(user_id)?,
            accounts: storage.accounts.delete_owned_by(user_id)?,
            key_deleted: storage.keys.delete_user_key(user_id)?,
        };

        for account_id in &accounts {
            self.vault.records().forget_account(account_id);
        }
        self.vault.crypto().forget_user(user_id);

        storage.log_delete(EntityType::EncryptionKey, user_id.to_string(), user_id);
        info!(user_id = %user_id, rows = report.total_rows(), "erased user data");
        Ok(report)
    }
}
