//! Dashboard summary
//!
//! Figures for the overview screen, all computed from decrypted values.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::error::VaultResult;
use crate::models::{Transaction, TransactionType, UserId};
use crate::vault::Vault;

use super::{AccountService, LoanService, RecurringService, TransactionService};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// First day of the month the monthly figures cover
    pub month: NaiveDate,
    pub total_balance: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub total_debt: f64,
    pub net_worth: f64,
    /// Current-month expenses keyed by category
    pub expenses_by_category: BTreeMap<String, f64>,
    pub account_count: usize,
    pub transaction_count: usize,
    pub loan_count: usize,
    pub recurring_count: usize,
}

/// Expense totals for one month of a trend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyExpenses {
    /// First day of the month
    pub month: NaiveDate,
    /// Totals keyed by [`category_key`]; every category the user has ever
    /// spent under is present, zero when unused that month
    pub by_category: BTreeMap<String, f64>,
}

/// Key a category for trend series: lowercase with whitespace removed, so
/// "Eating Out" and "eating out" share a series
pub fn category_key(category: &str) -> String {
    category
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_expense(txn: &Transaction) -> bool {
    txn.transaction_type == TransactionType::Expense
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub struct DashboardService<'a> {
    vault: &'a Vault,
}

impl<'a> DashboardService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    pub fn summary(&self, user_id: &UserId, today: NaiveDate) -> VaultResult<DashboardSummary> {
        let accounts = AccountService::new(self.vault).list(user_id)?;
        let transactions = TransactionService::new(self.vault).list(user_id)?;
        let loans = LoanService::new(self.vault).list(user_id)?;
        let recurring = RecurringService::new(self.vault).list(user_id)?;

        let month = month_start(today);
        let in_month =
            |d: &NaiveDate| d.year() == today.year() && d.month() == today.month();

        let mut monthly_income = 0.0;
        let mut monthly_expenses = 0.0;
        let mut expenses_by_category = BTreeMap::new();
        for view in &transactions {
            let txn = &view.transaction;
            if !in_month(&txn.date) {
                continue;
            }
            match txn.transaction_type {
                TransactionType::Income => monthly_income += txn.amount,
                TransactionType::Expense => {
                    monthly_expenses += txn.amount;
                    *expenses_by_category
                        .entry(txn.category.clone())
                        .or_insert(0.0) += txn.amount;
                }
                TransactionType::Investment | TransactionType::Transfer => {}
            }
        }

        let total_balance: f64 = accounts.iter().map(|a| a.balance).sum();
        let total_debt: f64 = loans.iter().map(|l| l.outstanding_balance).sum();

        Ok(DashboardSummary {
            month,
            total_balance,
            monthly_income,
            monthly_expenses,
            total_debt,
            net_worth: total_balance - total_debt,
            expenses_by_category,
            account_count: accounts.len(),
            transaction_count: transactions.len(),
            loan_count: loans.len(),
            recurring_count: recurring.len(),
        })
    }

    /// Per-category expense totals for the `months` months ending with the
    /// one containing `today`, oldest first
    pub fn monthly_expenses(
        &self,
        user_id: &UserId,
        today: NaiveDate,
        months: u32,
    ) -> VaultResult<Vec<MonthlyExpenses>> {
        let transactions = TransactionService::new(self.vault).list(user_id)?;
        let expenses: Vec<&Transaction> = transactions
            .iter()
            .map(|view| &view.transaction)
            .filter(|txn| is_expense(txn))
            .collect();

        let zeroed: BTreeMap<String, f64> = expenses
            .iter()
            .map(|txn| (category_key(&txn.category), 0.0))
            .collect();

        let current = month_start(today);
        let mut series: BTreeMap<NaiveDate, BTreeMap<String, f64>> = (0..months)
            .filter_map(|back| current.checked_sub_months(Months::new(back)))
            .map(|month| (month, zeroed.clone()))
            .collect();

        for txn in expenses {
            if let Some(totals) = series.get_mut(&month_start(txn.date)) {
                *totals.entry(category_key(&txn.category)).or_insert(0.0) += txn.amount;
            }
        }

        Ok(series
            .into_iter()
            .map(|(month, by_category)| MonthlyExpenses { month, by_category })
            .collect())
    }
}
