//! Recurring transaction model
//!
//! A template that produces a real transaction each time its due date comes
//! around. `description`, `amount` and `category` are sensitive.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::AccountRef;
use super::ids::{AccountId, RecurringId, UserId};
use super::transaction::TransactionType;

/// How often a recurring transaction fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "yearly" | "annual" | "annually" => Some(Self::Yearly),
            _ => None,
        }
    }

    /// The next occurrence after `date`
    ///
    /// Days past the end of the target month clamp to its last day, so
    /// Jan 31 advances to Feb 28 (or 29).
    pub fn advance(&self, date: NaiveDate) -> Option<NaiveDate> {
        let months = match self {
            Self::Monthly => Months::new(1),
            Self::Yearly => Months::new(12),
        };
        date.checked_add_months(months)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => write!(f, "Monthly"),
            Self::Yearly => write!(f, "Yearly"),
        }
    }
}

/// A decrypted recurring transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: RecurringId,
    pub user_id: UserId,
    pub account_id: AccountId,
    #[serde(default)]
    pub to_account_id: Option<AccountId>,
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub next_due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a recurring transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecurring {
    pub account_id: AccountId,
    pub to_account_id: Option<AccountId>,
    pub description: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
}

/// Plaintext column values for a recurring insert or update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurringPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}

/// A recurring transaction with its account's name and type
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringView {
    pub recurring: RecurringTransaction,
    pub account: Option<AccountRef>,
}

/// What happened to one rule during a processing run
#[derive(Debug, Clone, PartialEq)]
pub enum RecurringOutcome {
    /// Transaction posted and due date advanced
    Success,
    /// Transaction posted but the due date could not be advanced; the rule
    /// will fire again on the next run
    Partial(String),
    /// Nothing was posted
    Failed(String),
}

/// Per-rule result of [`process_due`](crate::services::RecurringService::process_due)
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringRun {
    pub recurring_id: RecurringId,
    pub user_id: UserId,
    pub due_date: NaiveDate,
    pub outcome: RecurringOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_advance() {
        assert_eq!(
            Frequency::Monthly.advance(date(2025, 3, 10)),
            Some(date(2025, 4, 10))
        );
        assert_eq!(
            Frequency::Monthly.advance(date(2025, 12, 5)),
            Some(date(2026, 1, 5))
        );
    }

    #[test]
    fn test_month_end_clamps() {
        assert_eq!(
            Frequency::Monthly.advance(date(2025, 1, 31)),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            Frequency::Monthly.advance(date(2024, 1, 31)),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn test_yearly_advance_from_leap_day() {
        assert_eq!(
            Frequency::Yearly.advance(date(2024, 2, 29)),
            Some(date(2025, 2, 28))
        );
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!(Frequency::parse("MONTHLY"), Some(Frequency::Monthly));
        assert_eq!(Frequency::parse("annual"), Some(Frequency::Yearly));
        assert_eq!(Frequency::parse("weekly"), None);
    }
}
