//! Typed record encryption
//!
//! [`RecordCipher`] converts between typed models and stored rows for every
//! entity, and owns the one read-modify-write the storage layer can't do on
//! its own: adjusting an encrypted account balance.
//!
//! Balance adjustments for one account are serialized in-process by a
//! per-account lock. Each write is checked, under the table's file lock,
//! against the row version read just before it, as it stands on disk. A
//! mismatch (another process got there first) is retried a bounded number
//! of times.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::{EntityKind, FieldCodec};
use crate::crypto::CryptoProvider;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    Account, AccountId, AccountPatch, AccountRef, Loan, LoanPatch, Preferences,
    RecurringPatch, RecurringTransaction, RecurringView, Transaction, TransactionPatch,
    TransactionView, UserId,
};
use crate::storage::{row_version, CasOutcome, Row, Table};

/// Embedded relation names used in transaction and recurring listings
pub const ACCOUNT_RELATION: &str = "financial_accounts";
pub const TO_ACCOUNT_RELATION: &str = "to_financial_accounts";

/// Serialize a model or patch into a row
pub fn to_row<T: Serialize>(value: &T) -> VaultResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(VaultError::Json(format!(
            "expected an object, got {}",
            json_type(&other)
        ))),
    }
}

/// Deserialize a decrypted row into a model
pub fn from_row<T: DeserializeOwned>(row: Row) -> VaultResult<T> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| VaultError::Json(format!("Malformed row: {}", e)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Encrypts and decrypts whole records, and adjusts encrypted balances
pub struct RecordCipher {
    crypto: Arc<CryptoProvider>,
    accounts: Arc<Table>,
    balance_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    max_retries: u32,
}

impl RecordCipher {
    pub fn new(crypto: Arc<CryptoProvider>, accounts: Arc<Table>, max_retries: u32) -> Self {
        Self {
            crypto,
            accounts,
            balance_locks: Mutex::new(HashMap::new()),
            max_retries: max_retries.max(1),
        }
    }

    fn codec(&self) -> FieldCodec<'_> {
        FieldCodec::new(&self.crypto)
    }

    fn encrypt<T: Serialize>(&self, kind: EntityKind, data: &T, user_id: &UserId) -> VaultResult<Row> {
        self.codec().encrypt_fields(kind, to_row(data)?, user_id)
    }

    fn decrypt<T: DeserializeOwned>(&self, kind: EntityKind, row: Row, user_id: &UserId) -> VaultResult<T> {
        from_row(self.codec().decrypt_fields(kind, row, user_id)?)
    }

    // accounts

    pub fn encrypt_account_data(&self, data: &AccountPatch, user_id: &UserId) -> VaultResult<Row> {
        self.encrypt(EntityKind::Account, data, user_id)
    }

    pub fn decrypt_account(&self, row: Row, user_id: &UserId) -> VaultResult<Account> {
        self.decrypt(EntityKind::Account, row, user_id)
    }

    /// Decrypt rows in order; the first failure aborts the whole batch
    pub fn batch_decrypt_accounts(&self, rows: Vec<Row>, user_id: &UserId) -> VaultResult<Vec<Account>> {
        rows.into_iter()
            .map(|row| self.decrypt_account(row, user_id))
            .collect()
    }

    // transactions

    pub fn encrypt_transaction_data(
        &self,
        data: &TransactionPatch,
        user_id: &UserId,
    ) -> VaultResult<Row> {
        self.encrypt(EntityKind::Transaction, data, user_id)
    }

    pub fn decrypt_transaction(&self, row: Row, user_id: &UserId) -> VaultResult<Transaction> {
        self.decrypt(EntityKind::Transaction, row, user_id)
    }

    pub fn batch_decrypt_transactions(
        &self,
        rows: Vec<Row>,
        user_id: &UserId,
    ) -> VaultResult<Vec<Transaction>> {
        rows.into_iter()
            .map(|row| self.decrypt_transaction(row, user_id))
            .collect()
    }

    /// Decrypt a transaction row that carries embedded account relations
    pub fn decrypt_transaction_view(&self, mut row: Row, user_id: &UserId) -> VaultResult<TransactionView> {
        let account = self.take_relation(&mut row, ACCOUNT_RELATION, user_id)?;
        let to_account = self.take_relation(&mut row, TO_ACCOUNT_RELATION, user_id)?;
        Ok(TransactionView {
            transaction: self.decrypt_transaction(row, user_id)?,
            account,
            to_account,
        })
    }

    pub fn batch_decrypt_transaction_views(
        &self,
        rows: Vec<Row>,
        user_id: &UserId,
    ) -> VaultResult<Vec<TransactionView>> {
        rows.into_iter()
            .map(|row| self.decrypt_transaction_view(row, user_id))
            .collect()
    }

    fn take_relation(
        &self,
        row: &mut Row,
        relation: &str,
        user_id: &UserId,
    ) -> VaultResult<Option<AccountRef>> {
        self.codec()
            .decrypt_relation(row, relation, EntityKind::Account, user_id)?;
        match row.remove(relation) {
            Some(Value::Object(inner)) => Ok(Some(from_row(inner)?)),
            _ => Ok(None),
        }
    }

    // loans

    pub fn encrypt_loan_data(&self, data: &LoanPatch, user_id: &UserId) -> VaultResult<Row> {
        self.encrypt(EntityKind::Loan, data, user_id)
    }

    pub fn decrypt_loan(&self, row: Row, user_id: &UserId) -> VaultResult<Loan> {
        self.decrypt(EntityKind::Loan, row, user_id)
    }

    pub fn batch_decrypt_loans(&self, rows: Vec<Row>, user_id: &UserId) -> VaultResult<Vec<Loan>> {
        rows.into_iter()
            .map(|row| self.decrypt_loan(row, user_id))
            .collect()
    }

    // recurring transactions

    pub fn encrypt_recurring_data(&self, data: &RecurringPatch, user_id: &UserId) -> VaultResult<Row> {
        self.encrypt(EntityKind::RecurringTransaction, data, user_id)
    }

    pub fn decrypt_recurring(&self, row: Row, user_id: &UserId) -> VaultResult<RecurringTransaction> {
        self.decrypt(EntityKind::RecurringTransaction, row, user_id)
    }

    pub fn decrypt_recurring_view(&self, mut row: Row, user_id: &UserId) -> VaultResult<RecurringView> {
        let account = self.take_relation(&mut row, ACCOUNT_RELATION, user_id)?;
        Ok(RecurringView {
            recurring: self.decrypt_recurring(row, user_id)?,
            account,
        })
    }

    pub fn batch_decrypt_recurring_views(
        &self,
        rows: Vec<Row>,
        user_id: &UserId,
    ) -> VaultResult<Vec<RecurringView>> {
        rows.into_iter()
            .map(|row| self.decrypt_recurring_view(row, user_id))
            .collect()
    }

    // preferences

    /// Build the `{preferences: <ciphertext>}` row for a preferences document
    pub fn encrypt_preferences(&self, prefs: &Preferences, user_id: &UserId) -> VaultResult<Row> {
        let mut row = Row::new();
        row.insert("preferences".into(), serde_json::to_value(prefs)?);
        self.codec()
            .encrypt_fields(EntityKind::UserPreferences, row, user_id)
    }

    pub fn decrypt_preferences(&self, row: Row, user_id: &UserId) -> VaultResult<Preferences> {
        let mut row = self
            .codec()
            .decrypt_fields(EntityKind::UserPreferences, row, user_id)?;
        match row.remove("preferences") {
            Some(Value::Null) | None => Ok(Preferences::default()),
            Some(doc) => serde_json::from_value(doc)
                .map_err(|e| VaultError::Json(format!("Malformed preferences: {}", e))),
        }
    }

    // balances

    /// Read and decrypt an account's balance
    pub fn get_decrypted_balance(&self, account_id: &AccountId, user_id: &UserId) -> VaultResult<f64> {
        Ok(self.read_balance(account_id, user_id)?.0)
    }

    /// Overwrite an account's balance
    pub fn update_encrypted_balance(
        &self,
        account_id: &AccountId,
        user_id: &UserId,
        new_balance: f64,
    ) -> VaultResult<()> {
        let lock = self.balance_lock(account_id)?;
        let _guard = lock_guard(&lock)?;

        let patch = self.balance_patch(new_balance, user_id)?;
        self.accounts
            .update(&account_id.key(), user_id, patch)?
            .ok_or_else(|| VaultError::account_not_found(account_id.to_string()))?;
        Ok(())
    }

    /// Add `delta` to an account's balance and return the new balance
    ///
    /// Concurrent adjustments to the same account all land; none is lost.
    pub fn adjust_balance(&self, account_id: &AccountId, user_id: &UserId, delta: f64) -> VaultResult<f64> {
        if !delta.is_finite() {
            return Err(VaultError::Validation(
                "Balance adjustment must be a finite number".into(),
            ));
        }

        let lock = self.balance_lock(account_id)?;
        let _guard = lock_guard(&lock)?;
        let key = account_id.key();

        for attempt in 1..=self.max_retries {
            let (current, version) = self.read_balance(account_id, user_id)?;
            let updated = current + delta;
            let patch = self.balance_patch(updated, user_id)?;

            match self
                .accounts
                .update_if_version(&key, user_id, patch, version)?
            {
                CasOutcome::Updated(_) => {
                    debug!(account_id = %account_id, attempt, "balance adjusted");
                    return Ok(updated);
                }
                CasOutcome::Stale { current } => {
                    debug!(
                        account_id = %account_id,
                        attempt,
                        expected = version,
                        current,
                        "balance changed underneath update, retrying"
                    );
                }
                CasOutcome::Missing => {
                    return Err(VaultError::account_not_found(account_id.to_string()));
                }
            }
        }

        warn!(account_id = %account_id, attempts = self.max_retries, "giving up on balance update");
        Err(VaultError::BalanceConflict {
            account_id: account_id.to_string(),
            attempts: self.max_retries,
        })
    }

    /// Drop the in-process lock for a deleted account
    pub fn forget_account(&self, account_id: &AccountId) {
        if let Ok(mut locks) = self.balance_locks.lock() {
            locks.remove(account_id);
        }
    }

    fn read_balance(&self, account_id: &AccountId, user_id: &UserId) -> VaultResult<(f64, u64)> {
        let row = self
            .accounts
            .get(&account_id.key(), user_id)?
            .ok_or_else(|| VaultError::account_not_found(account_id.to_string()))?;

        let blob = row.get("balance").and_then(Value::as_str).ok_or_else(|| {
            VaultError::Decryption("financial_accounts.balance: stored value is not ciphertext".into())
        })?;

        let balance = self.crypto.decrypt_number(blob, user_id)?;
        Ok((balance, row_version(&row)))
    }

    fn balance_patch(&self, balance: f64, user_id: &UserId) -> VaultResult<Row> {
        let mut patch = Row::new();
        patch.insert(
            "balance".into(),
            Value::String(self.crypto.encrypt_number(balance, user_id)?),
        );
        Ok(patch)
    }

    fn balance_lock(&self, account_id: &AccountId) -> VaultResult<Arc<Mutex<()>>> {
        let mut locks = self
            .balance_locks
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire balance lock table: {}", e)))?;
        Ok(Arc::clone(locks.entry(*account_id).or_default()))
    }
}

fn lock_guard(lock: &Mutex<()>) -> VaultResult<MutexGuard<'_, ()>> {
    lock.lock()
        .map_err(|e| VaultError::Storage(format!("Failed to acquire balance lock: {}", e)))
}
