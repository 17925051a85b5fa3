//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod account;
pub mod dashboard;
pub mod loan;
pub mod prefs;
pub mod recurring;
pub mod transaction;
pub mod user;

pub use account::{handle_account_command, AccountCommands};
pub use dashboard::handle_dashboard_command;
pub use loan::{handle_loan_command, LoanCommands};
pub use prefs::{handle_prefs_command, PrefsCommands};
pub use recurring::{handle_recurring_command, RecurringCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};
pub use user::{handle_user_command, UserCommands};

use chrono::NaiveDate;

use crate::error::{VaultError, VaultResult};
use crate::models::{Account, UserId};
use crate::services::{AccountService, PreferenceService};
use crate::vault::Vault;

/// Parse a YYYY-MM-DD date, defaulting to today
pub(crate) fn parse_date(value: Option<&str>) -> VaultResult<NaiveDate> {
    match value {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            VaultError::Validation(format!("Invalid date format: '{}'. Use YYYY-MM-DD", s))
        }),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Parse a decimal amount such as "1000" or "250.75"
pub(crate) fn parse_amount(value: &str) -> VaultResult<f64> {
    value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid amount: '{}'. Use a number like '250.75' or '1000'",
                value
            ))
        })
}

/// Whether `input` names an entity by its full id, its short display id, or
/// an unambiguous id prefix
pub(crate) fn matches_id(display: &str, key: &str, input: &str) -> bool {
    let input = input.trim();
    input == display || input == key || (input.len() >= 8 && key.starts_with(input))
}

/// Look up an account by name or id, or fail with `AccountNotFound`
pub(crate) fn find_account(vault: &Vault, user_id: &UserId, identifier: &str) -> VaultResult<Account> {
    let service = AccountService::new(vault);
    if let Some(account) = service.find(user_id, identifier)? {
        return Ok(account);
    }
    service
        .list(user_id)?
        .into_iter()
        .find(|a| matches_id(&a.id.to_string(), &a.id.key(), identifier))
        .ok_or_else(|| VaultError::account_not_found(identifier))
}

/// The user's display currency
pub(crate) fn currency(vault: &Vault, user_id: &UserId) -> String {
    PreferenceService::new(vault).get(user_id).currency
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("250.75").unwrap(), 250.75);
        assert_eq!(parse_amount(" 1,000 ").unwrap(), 1000.0);
        assert!(parse_amount("ten").is_err());
        assert!(parse_amount("inf").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2025-03-01")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
        assert!(parse_date(Some("03/01/2025")).is_err());
        assert!(parse_date(None).is_ok());
    }

    #[test]
    fn test_matches_id() {
        let key = "3f2a9c1e-0000-4000-8000-000000000000";
        assert!(matches_id("acc-3f2a9c1e", key, "acc-3f2a9c1e"));
        assert!(matches_id("acc-3f2a9c1e", key, key));
        assert!(matches_id("acc-3f2a9c1e", key, "3f2a9c1e"));
        assert!(!matches_id("acc-3f2a9c1e", key, "3f2a"));
    }
}
