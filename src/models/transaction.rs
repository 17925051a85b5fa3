//! Transaction model
//!
//! A dated money movement against an account. Transfers are stored as two
//! linked rows, one per account, whose combined effect moves `amount` from
//! the source to the destination.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::AccountRef;
use super::ids::{AccountId, TransactionId, UserId};

/// Kind of transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
    Investment,
    Transfer,
}

impl TransactionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "investment" => Some(Self::Investment),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
            Self::Investment => write!(f, "Investment"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

/// Which side of a transfer a row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferLeg {
    /// Row on the source account; `to_account_id` is the destination
    Outgoing,
    /// Row on the destination account; `to_account_id` is the source
    Incoming,
}

/// A decrypted transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub account_id: AccountId,
    #[serde(default)]
    pub to_account_id: Option<AccountId>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// The other leg of a transfer
    #[serde(default)]
    pub linked_transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub transfer_leg: Option<TransferLeg>,
}

impl Transaction {
    /// Side of the transfer this row records
    ///
    /// Rows written before legs were tagged fall back to the note prefix.
    pub fn leg(&self) -> TransferLeg {
        match self.transfer_leg {
            Some(leg) => leg,
            None if self
                .notes
                .as_deref()
                .is_some_and(|n| n.starts_with("Transfer from")) =>
            {
                TransferLeg::Incoming
            }
            None => TransferLeg::Outgoing,
        }
    }

    /// Signed balance changes this transaction applied when it was posted
    ///
    /// For a transfer this is the effect of the whole pair, so it must only
    /// be applied or reversed once per pair.
    pub fn postings(&self) -> Vec<(AccountId, f64)> {
        match self.transaction_type {
            TransactionType::Income => vec![(self.account_id, self.amount)],
            TransactionType::Expense | TransactionType::Investment => {
                vec![(self.account_id, -self.amount)]
            }
            TransactionType::Transfer => match (self.leg(), self.to_account_id) {
                (TransferLeg::Outgoing, Some(dest)) => {
                    vec![(self.account_id, -self.amount), (dest, self.amount)]
                }
                (TransferLeg::Incoming, Some(source)) => {
                    vec![(source, -self.amount), (self.account_id, self.amount)]
                }
                (_, None) => Vec::new(),
            },
        }
    }
}

/// Input for creating a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub to_account_id: Option<AccountId>,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
}

/// Plaintext column values for a transaction insert or update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_leg: Option<TransferLeg>,
}

impl TransactionPatch {
    /// Whether the patch touches a column that feeds account balances
    pub fn touches_balances(&self) -> bool {
        self.account_id.is_some()
            || self.to_account_id.is_some()
            || self.amount.is_some()
            || self.transaction_type.is_some()
    }

    /// Apply the patch to a decrypted transaction
    pub fn apply_to(&self, txn: &mut Transaction) {
        if let Some(account_id) = self.account_id {
            txn.account_id = account_id;
        }
        if let Some(to_account_id) = self.to_account_id {
            txn.to_account_id = Some(to_account_id);
        }
        if let Some(amount) = self.amount {
            txn.amount = amount;
        }
        if let Some(transaction_type) = self.transaction_type {
            txn.transaction_type = transaction_type;
        }
        if let Some(category) = &self.category {
            txn.category = category.clone();
        }
        if let Some(notes) = &self.notes {
            txn.notes = Some(notes.clone());
        }
        if let Some(date) = self.date {
            txn.date = date;
        }
    }
}

/// A transaction with its accounts' names and types
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionView {
    pub transaction: Transaction,
    pub account: Option<AccountRef>,
    pub to_account: Option<AccountRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(transaction_type: TransactionType) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            user_id: UserId::from("u1"),
            account_id: AccountId::new(),
            to_account_id: None,
            amount: 40.0,
            transaction_type,
            category: "Food".into(),
            notes: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            created_at: Utc::now(),
            linked_transaction_id: None,
            transfer_leg: None,
        }
    }

    #[test]
    fn test_income_and_expense_postings() {
        let income = sample(TransactionType::Income);
        assert_eq!(income.postings(), vec![(income.account_id, 40.0)]);

        let expense = sample(TransactionType::Expense);
        assert_eq!(expense.postings(), vec![(expense.account_id, -40.0)]);

        let investment = sample(TransactionType::Investment);
        assert_eq!(investment.postings(), vec![(investment.account_id, -40.0)]);
    }

    #[test]
    fn test_both_transfer_legs_describe_the_same_movement() {
        let source = AccountId::new();
        let dest = AccountId::new();

        let mut outgoing = sample(TransactionType::Transfer);
        outgoing.account_id = source;
        outgoing.to_account_id = Some(dest);
        outgoing.transfer_leg = Some(TransferLeg::Outgoing);

        let mut incoming = sample(TransactionType::Transfer);
        incoming.account_id = dest;
        incoming.to_account_id = Some(source);
        incoming.transfer_leg = Some(TransferLeg::Incoming);

        assert_eq!(outgoing.postings(), vec![(source, -40.0), (dest, 40.0)]);
        assert_eq!(incoming.postings(), outgoing.postings());
    }

    #[test]
    fn test_untagged_leg_uses_note_prefix() {
        let mut txn = sample(TransactionType::Transfer);
        txn.notes = Some("Transfer from account (rent)".into());
        assert_eq!(txn.leg(), TransferLeg::Incoming);

        txn.notes = Some("Transfer to account".into());
        assert_eq!(txn.leg(), TransferLeg::Outgoing);
    }

    #[test]
    fn test_patch_apply_and_balance_detection() {
        let mut txn = sample(TransactionType::Expense);
        let patch = TransactionPatch {
            category: Some("Rent".into()),
            ..Default::default()
        };
        assert!(!patch.touches_balances());
        patch.apply_to(&mut txn);
        assert_eq!(txn.category, "Rent");

        let patch = TransactionPatch {
            amount: Some(12.5),
            ..Default::default()
        };
        assert!(patch.touches_balances());
    }
}
