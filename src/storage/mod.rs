//! Storage layer for finvault
//!
//! One JSON file per table under `data/`, written atomically. Rows hold the
//! at-rest form of each entity; nothing in this layer encrypts or decrypts.

pub mod file_io;
pub mod keys;
pub mod tables;

pub use keys::{KeyRepository, KeyStore};
pub use tables::{row_owner, row_version, CasOutcome, Row, Table, TableSpec};

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::audit::{AuditEntry, AuditLogger, EntityType};
use crate::config::VaultPaths;
use crate::error::VaultResult;
use crate::models::{AccountId, UserId};

pub const KEYS_TABLE: &str = "user_encryption_keys";
pub const ACCOUNTS: TableSpec = TableSpec::with_id("financial_accounts");
pub const TRANSACTIONS: TableSpec = TableSpec::with_id("transactions");
pub const LOANS: TableSpec = TableSpec::with_id("loans");
pub const RECURRING: TableSpec = TableSpec::with_id("recurring_transactions");
pub const PREFERENCES: TableSpec = TableSpec {
    name: "user_preferences",
    key_column: "user_id",
    timestamps: false,
};

/// Main storage coordinator that provides access to all tables
pub struct Storage {
    paths: VaultPaths,
    pub keys: Arc<KeyRepository>,
    pub accounts: Arc<Table>,
    pub transactions: Table,
    pub loans: Table,
    pub recurring: Table,
    pub preferences: Table,
    audit: Option<AuditLogger>,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: VaultPaths, audit_enabled: bool) -> VaultResult<Self> {
        paths.ensure_directories()?;

        let table = |spec: TableSpec| Table::new(spec, paths.table_file(spec.name));

        Ok(Self {
            keys: Arc::new(KeyRepository::new(paths.table_file(KEYS_TABLE))),
            accounts: Arc::new(table(ACCOUNTS)),
            transactions: table(TRANSACTIONS),
            loans: table(LOANS),
            recurring: table(RECURRING),
            preferences: table(PREFERENCES),
            audit: audit_enabled.then(|| AuditLogger::new(paths.audit_log())),
            paths,
        })
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    /// Load all tables from disk
    pub fn load_all(&self) -> VaultResult<()> {
        self.keys.load()?;
        self.accounts.load()?;
        self.transactions.load()?;
        self.loans.load()?;
        self.recurring.load()?;
        self.preferences.load()?;
        Ok(())
    }

    pub fn audit(&self) -> Option<&AuditLogger> {
        self.audit.as_ref()
    }

    /// Ids of every account the user owns
    pub fn list_account_ids(&self, user_id: &UserId) -> VaultResult<Vec<AccountId>> {
        Ok(self
            .accounts
            .list(user_id)?
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str)?.parse().ok())
            .collect())
    }

    /// Attach each row's referenced account as an embedded `{name, type}` object
    ///
    /// `relations` pairs the embedded key with the foreign-key column, e.g.
    /// `("financial_accounts", "account_id")`. Embedded values are copied
    /// from storage as-is (so `name` is still ciphertext). A dangling or null
    /// reference embeds `null`.
    pub fn embed_accounts(
        &self,
        user_id: &UserId,
        rows: &mut [Row],
        relations: &[(&str, &str)],
    ) -> VaultResult<()> {
        for row in rows.iter_mut() {
            for (relation, column) in relations {
                let embedded = match row.get(*column).and_then(Value::as_str) {
                    Some(account_key) => self
                        .accounts
                        .get(account_key, user_id)?
                        .map(|account| {
                            let mut summary = Row::new();
                            for field in ["name", "type"] {
                                if let Some(v) = account.get(field) {
                                    summary.insert(field.to_string(), v.clone());
                                }
                            }
                            Value::Object(summary)
                        })
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                };
                row.insert(relation.to_string(), embedded);
            }
        }
        Ok(())
    }

    fn log(&self, entry: AuditEntry) {
        if let Some(logger) = &self.audit {
            // a failed audit write never undoes the data write
            if let Err(e) = logger.log(&entry) {
                warn!(error = %e, entity_id = %entry.entity_id, "failed to write audit entry");
            }
        }
    }

    pub fn log_create(
        &self,
        entity_type: EntityType,
        entity_id: String,
        user_id: &UserId,
        fields: Vec<String>,
    ) {
        self.log(AuditEntry::create(entity_type, entity_id, user_id, fields));
    }

    pub fn log_update(
        &self,
        entity_type: EntityType,
        entity_id: String,
        user_id: &UserId,
        fields: Vec<String>,
    ) {
        self.log(AuditEntry::update(entity_type, entity_id, user_id, fields));
    }

    pub fn log_delete(&self, entity_type: EntityType, entity_id: String, user_id: &UserId) {
        self.log(AuditEntry::delete(entity_type, entity_id, user_id));
    }
}

/// Column names present in a row, for audit entries
pub fn column_names(row: &Row) -> Vec<String> {
    row.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::new(paths, true).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_storage_creation() {
        let (temp_dir, storage) = create_test_storage();
        assert!(temp_dir.path().join("data").exists());
        storage.load_all().unwrap();
        assert_eq!(storage.accounts.count().unwrap(), 0);
    }

    #[test]
    fn test_embed_accounts() {
        let (_temp, storage) = create_test_storage();
        let user = UserId::from("u1");
        let mut account = Row::new();
        account.insert("name".into(), json!("ciphertext"));
        account.insert("type".into(), json!("SAVINGS"));
        account.insert("balance".into(), json!("other-ciphertext"));
        let account = storage.accounts.insert(&user, account).unwrap();

        let mut txn = Row::new();
        txn.insert("account_id".into(), account["id"].clone());
        txn.insert("to_account_id".into(), Value::Null);
        let mut rows = vec![txn];

        storage
            .embed_accounts(
                &user,
                &mut rows,
                &[
                    ("financial_accounts", "account_id"),
                    ("to_financial_accounts", "to_account_id"),
                ],
            )
            .unwrap();

        assert_eq!(
            rows[0]["financial_accounts"],
            json!({"name": "ciphertext", "type": "SAVINGS"})
        );
        assert_eq!(rows[0]["to_financial_accounts"], Value::Null);
    }

    #[test]
    fn test_audit_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::new(paths.clone(), false).unwrap();

        storage.log_delete(EntityType::Loan, "loan-1".into(), &UserId::from("u1"));

        assert!(storage.audit().is_none());
        assert!(!paths.audit_log().exists());
    }
}
