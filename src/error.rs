//! Custom error types for finvault
//!
//! One error enum covers the key store, the cipher layer, the field codec and
//! the storage tables, so callers can match on crypto failures directly.

use thiserror::Error;

/// The main error type for finvault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for input data
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// No key row exists for the user
    #[error("No encryption key for user {user_id}")]
    KeyNotFound { user_id: String },

    /// A key row already exists for the user
    #[error("Encryption key already exists for user {user_id}")]
    DuplicateKey { user_id: String },

    /// The key could not be fetched or provisioned
    #[error("Encryption key unavailable for user {user_id}: {reason}")]
    KeyUnavailable { user_id: String, reason: String },

    /// Encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Authentication tag mismatch, malformed blob, or non-numeric plaintext
    /// in a numeric column
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Balance lookup target is missing
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The account balance kept changing underneath a read-modify-write
    #[error("Balance of account {account_id} changed concurrently, gave up after {attempts} attempts")]
    BalanceConflict { account_id: String, attempts: u32 },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl VaultError {
    /// Create an "account not found" error
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::AccountNotFound(identifier.into())
    }

    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for loans
    pub fn loan_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Loan",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for recurring transactions
    pub fn recurring_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Recurring transaction",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AccountNotFound(_))
    }

    /// Check if this error came from the key store or the cipher layer
    pub fn is_crypto(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound { .. }
                | Self::DuplicateKey { .. }
                | Self::KeyUnavailable { .. }
                | Self::Encryption(_)
                | Self::Decryption(_)
        )
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for finvault operations
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_account_not_found() {
        let err = VaultError::account_not_found("acc-1234");
        assert_eq!(err.to_string(), "Account not found: acc-1234");
        assert!(err.is_not_found());
        assert!(!err.is_crypto());
    }

    #[test]
    fn test_crypto_errors_are_classified() {
        assert!(VaultError::Decryption("bad tag".into()).is_crypto());
        assert!(VaultError::KeyNotFound {
            user_id: "u1".into()
        }
        .is_crypto());
        assert!(!VaultError::Storage("disk".into()).is_crypto());
    }

    #[test]
    fn test_balance_conflict_display() {
        let err = VaultError::BalanceConflict {
            account_id: "acc-1".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Balance of account acc-1 changed concurrently, gave up after 3 attempts"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VaultError = io_err.into();
        assert!(matches!(err, VaultError::Io(_)));
    }
}
