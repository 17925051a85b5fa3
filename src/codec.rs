//! Field-level codec for stored rows
//!
//! Each entity kind lists its sensitive columns and how their plaintext is
//! typed. [`FieldCodec`] walks a row and seals or opens exactly those
//! columns, leaving every other column alone. A sensitive column that is
//! absent or `null` stays that way.
//!
//! Decoding fails closed: a sensitive column holding anything other than
//! ciphertext text is an error, never a pass-through.

use serde_json::{Number, Value};

use crate::crypto::CryptoProvider;
use crate::error::{VaultError, VaultResult};
use crate::models::UserId;
use crate::storage::Row;

/// How a sensitive column's plaintext is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    /// Any JSON value, serialized before sealing
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensitiveField {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> SensitiveField {
    SensitiveField {
        name,
        kind: FieldKind::Text,
    }
}

const fn number(name: &'static str) -> SensitiveField {
    SensitiveField {
        name,
        kind: FieldKind::Number,
    }
}

const ACCOUNT_FIELDS: &[SensitiveField] = &[text("name"), number("balance")];
const TRANSACTION_FIELDS: &[SensitiveField] = &[number("amount"), text("category"), text("notes")];
const LOAN_FIELDS: &[SensitiveField] = &[
    text("name"),
    number("total_amount"),
    number("outstanding_balance"),
    number("emi_amount"),
];
const RECURRING_FIELDS: &[SensitiveField] = &[text("description"), number("amount"), text("category")];
const PREFERENCE_FIELDS: &[SensitiveField] = &[SensitiveField {
    name: "preferences",
    kind: FieldKind::Json,
}];

/// Kinds of stored entity with encrypted columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Transaction,
    Loan,
    RecurringTransaction,
    UserPreferences,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Account,
        Self::Transaction,
        Self::Loan,
        Self::RecurringTransaction,
        Self::UserPreferences,
    ];

    /// Storage table holding this entity
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Account => "financial_accounts",
            Self::Transaction => "transactions",
            Self::Loan => "loans",
            Self::RecurringTransaction => "recurring_transactions",
            Self::UserPreferences => "user_preferences",
        }
    }

    pub const fn sensitive_fields(&self) -> &'static [SensitiveField] {
        match self {
            Self::Account => ACCOUNT_FIELDS,
            Self::Transaction => TRANSACTION_FIELDS,
            Self::Loan => LOAN_FIELDS,
            Self::RecurringTransaction => RECURRING_FIELDS,
            Self::UserPreferences => PREFERENCE_FIELDS,
        }
    }

    pub fn is_sensitive(&self, column: &str) -> bool {
        self.sensitive_fields().iter().any(|f| f.name == column)
    }
}

/// Seals and opens the sensitive columns of rows
pub struct FieldCodec<'a> {
    crypto: &'a CryptoProvider,
}

impl<'a> FieldCodec<'a> {
    pub fn new(crypto: &'a CryptoProvider) -> Self {
        Self { crypto }
    }

    /// Replace each present sensitive column with its ciphertext
    pub fn encrypt_fields(&self, kind: EntityKind, mut row: Row, user_id: &UserId) -> VaultResult<Row> {
        for field in kind.sensitive_fields() {
            let Some(value) = row.get_mut(field.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let sealed = self
                .seal(field, value, user_id)
                .map_err(|e| with_column(e, kind, field))?;
            *value = Value::String(sealed);
        }
        Ok(row)
    }

    /// Replace each present sensitive column with its typed plaintext
    pub fn decrypt_fields(&self, kind: EntityKind, mut row: Row, user_id: &UserId) -> VaultResult<Row> {
        for field in kind.sensitive_fields() {
            let Some(value) = row.get_mut(field.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let opened = self
                .open(field, value, user_id)
                .map_err(|e| with_column(e, kind, field))?;
            *value = opened;
        }
        Ok(row)
    }

    /// Decrypt an embedded related row (e.g. a transaction's account) in place
    ///
    /// A missing or `null` relation is left as it is.
    pub fn decrypt_relation(
        &self,
        row: &mut Row,
        relation: &str,
        kind: EntityKind,
        user_id: &UserId,
    ) -> VaultResult<()> {
        let Some(embedded) = row.get_mut(relation) else {
            return Ok(());
        };
        if let Value::Object(inner) = embedded {
            let decrypted = self.decrypt_fields(kind, std::mem::take(inner), user_id)?;
            *inner = decrypted;
        }
        Ok(())
    }

    fn seal(&self, field: &SensitiveField, value: &Value, user_id: &UserId) -> VaultResult<String> {
        match (field.kind, value) {
            (FieldKind::Text, Value::String(s)) => self.crypto.encrypt_string(s, user_id),
            (FieldKind::Number, Value::Number(n)) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| VaultError::Validation("number out of range".into()))?;
                self.crypto.encrypt_number(n, user_id)
            }
            (FieldKind::Json, value) => {
                let text = serde_json::to_string(value)?;
                self.crypto.encrypt_string(&text, user_id)
            }
            (FieldKind::Text, _) => Err(VaultError::Validation("expected text".into())),
            (FieldKind::Number, _) => Err(VaultError::Validation("expected a number".into())),
        }
    }

    fn open(&self, field: &SensitiveField, value: &Value, user_id: &UserId) -> VaultResult<Value> {
        let Value::String(blob) = value else {
            return Err(VaultError::Decryption(
                "stored value is not ciphertext".into(),
            ));
        };

        match field.kind {
            FieldKind::Text => Ok(Value::String(self.crypto.decrypt_string(blob, user_id)?)),
            FieldKind::Number => {
                let n = self.crypto.decrypt_number(blob, user_id)?;
                Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| VaultError::Decryption("Decrypted value is not a number".into()))
            }
            FieldKind::Json => {
                let text = self.crypto.decrypt_string(blob, user_id)?;
                if text.is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text).map_err(|_| {
                    VaultError::Decryption("Decrypted value is not valid JSON".into())
                })
            }
        }
    }
}

/// Prefix an error with the table and column it came from
fn with_column(err: VaultError, kind: EntityKind, field: &SensitiveField) -> VaultError {
    let place = format!("{}.{}", kind.table(), field.name);
    match err {
        VaultError::Decryption(msg) => VaultError::Decryption(format!("{}: {}", place, msg)),
        VaultError::Encryption(msg) => VaultError::Encryption(format!("{}: {}", place, msg)),
        VaultError::Validation(msg) => VaultError::Validation(format!("{}: {}", place, msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyCache;
    use crate::storage::KeyRepository;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn provider() -> (TempDir, CryptoProvider) {
        let temp_dir = TempDir::new().unwrap();
        let keys = Arc::new(KeyRepository::new(temp_dir.path().join("keys.json")));
        let provider = CryptoProvider::new(keys, KeyCache::new(8, Duration::from_secs(60)));
        (temp_dir, provider)
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_only_sensitive_columns_change() {
        let (_temp, crypto) = provider();
        let codec = FieldCodec::new(&crypto);
        let user = UserId::from("u1");

        let plain = row(json!({"name": "Wallet", "balance": 250.75, "type": "WALLET"}));
        let sealed = codec
            .encrypt_fields(EntityKind::Account, plain.clone(), &user)
            .unwrap();

        assert_eq!(sealed["type"], "WALLET");
        assert!(sealed["name"].is_string());
        assert_ne!(sealed["name"], "Wallet");
        assert!(sealed["balance"].is_string());

        let opened = codec
            .decrypt_fields(EntityKind::Account, sealed, &user)
            .unwrap();
        assert_eq!(opened, plain);
    }

    #[test]
    fn test_absent_and_null_columns_untouched() {
        let (_temp, crypto) = provider();
        let codec = FieldCodec::new(&crypto);
        let user = UserId::from("u1");

        let sealed = codec
            .encrypt_fields(EntityKind::Transaction, row(json!({"amount": 5, "notes": null})), &user)
            .unwrap();
        assert!(sealed["notes"].is_null());
        assert_eq!(sealed.len(), 2);

        let partial = codec
            .encrypt_fields(EntityKind::Account, row(json!({"name": "Only name"})), &user)
            .unwrap();
        assert!(!partial.contains_key("balance"));
    }

    #[test]
    fn test_preferences_json_roundtrip() {
        let (_temp, crypto) = provider();
        let codec = FieldCodec::new(&crypto);
        let user = UserId::from("u1");

        let plain = row(json!({"preferences": {"currency": "USD", "theme": "dark"}}));
        let sealed = codec
            .encrypt_fields(EntityKind::UserPreferences, plain.clone(), &user)
            .unwrap();
        assert!(sealed["preferences"].is_string());

        let opened = codec
            .decrypt_fields(EntityKind::UserPreferences, sealed, &user)
            .unwrap();
        assert_eq!(opened, plain);
    }

    #[test]
    fn test_plaintext_number_in_store_fails_closed() {
        let (_temp, crypto) = provider();
        let codec = FieldCodec::new(&crypto);

        let err = codec
            .decrypt_fields(EntityKind::Account, row(json!({"balance": 100})), &UserId::from("u1"))
            .unwrap_err();
        assert!(matches!(err, VaultError::Decryption(ref m) if m.starts_with("financial_accounts.balance")));
    }

    #[test]
    fn test_wrong_type_rejected_on_encrypt() {
        let (_temp, crypto) = provider();
        let codec = FieldCodec::new(&crypto);

        let err = codec
            .encrypt_fields(EntityKind::Loan, row(json!({"emi_amount": "ten"})), &UserId::from("u1"))
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn test_decrypt_relation() {
        let (_temp, crypto) = provider();
        let codec = FieldCodec::new(&crypto);
        let user = UserId::from("u1");

        let account = codec
            .encrypt_fields(EntityKind::Account, row(json!({"name": "Savings", "type": "SAVINGS"})), &user)
            .unwrap();
        let mut txn = row(json!({"financial_accounts": account, "to_financial_accounts": null}));

        codec
            .decrypt_relation(&mut txn, "financial_accounts", EntityKind::Account, &user)
            .unwrap();
        codec
            .decrypt_relation(&mut txn, "to_financial_accounts", EntityKind::Account, &user)
            .unwrap();

        assert_eq!(txn["financial_accounts"], json!({"name": "Savings", "type": "SAVINGS"}));
        assert!(txn["to_financial_accounts"].is_null());
    }

    #[test]
    fn test_field_tables() {
        assert!(EntityKind::Loan.is_sensitive("outstanding_balance"));
        assert!(!EntityKind::Loan.is_sensitive("start_date"));
        assert!(EntityKind::Transaction.is_sensitive("category"));
        assert!(!EntityKind::Transaction.is_sensitive("date"));
        for kind in EntityKind::ALL {
            assert!(!kind.sensitive_fields().is_empty());
        }
    }
}
