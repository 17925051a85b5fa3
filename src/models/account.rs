//! Account model
//!
//! A financial account owned by one user. `name` and `balance` are stored
//! encrypted; `type` stays in the clear so accounts can be grouped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, UserId};

/// Type of financial account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    CreditCard,
    Cash,
    Wallet,
}

impl AccountType {
    /// Parse account type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "savings" => Some(Self::Savings),
            "credit_card" | "creditcard" | "credit" => Some(Self::CreditCard),
            "cash" => Some(Self::Cash),
            "wallet" => Some(Self::Wallet),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Savings => write!(f, "Savings"),
            Self::CreditCard => write!(f, "Credit Card"),
            Self::Cash => write!(f, "Cash"),
            Self::Wallet => write!(f, "Wallet"),
        }
    }
}

/// A decrypted account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Validate a prospective account name
    pub fn validate_name(name: &str) -> Result<(), AccountValidationError> {
        if name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }

        let len = name.chars().count();
        if len > 100 {
            return Err(AccountValidationError::NameTooLong(len));
        }

        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.account_type)
    }
}

/// Plaintext column values for an account insert or update
///
/// Absent fields are left untouched by an update and omitted from the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

/// Account summary embedded in transaction and recurring listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    NameTooLong(usize),
    NonFiniteBalance,
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Account name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Account name too long ({} chars, max 100)", len)
            }
            Self::NonFiniteBalance => write!(f, "Account balance must be a finite number"),
        }
    }
}

impl std::error::Error for AccountValidationError {}
