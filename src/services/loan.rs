//! Loan service

use tracing::{debug, info, warn};

use crate::audit::EntityType;
use crate::error::{VaultError, VaultResult};
use crate::models::{Loan, LoanId, LoanPatch, NewLoan, UserId};
use crate::storage::{column_names, row_version, CasOutcome};
use crate::vault::Vault;

/// Service for loan management
pub struct LoanService<'a> {
    vault: &'a Vault,
}

impl<'a> LoanService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Record a new loan
    pub fn create(&self, user_id: &UserId, new: NewLoan) -> VaultResult<Loan> {
        new.validate().map_err(VaultError::Validation)?;

        let row = self
            .vault
            .records()
            .encrypt_loan_data(&LoanPatch::from(&new), user_id)?;
        let fields = column_names(&row);

        let stored = self.vault.storage().loans.insert(user_id, row)?;
        let loan = self.vault.records().decrypt_loan(stored, user_id)?;

        self.vault
            .storage()
            .log_create(EntityType::Loan, loan.id.key(), user_id, fields);
        info!(loan_id = %loan.id, user_id = %user_id, "created loan");
        Ok(loan)
    }

    pub fn get(&self, user_id: &UserId, id: &LoanId) -> VaultResult<Option<Loan>> {
        match self.vault.storage().loans.get(&id.key(), user_id)? {
            Some(row) => Ok(Some(self.vault.records().decrypt_loan(row, user_id)?)),
            None => Ok(None),
        }
    }

    /// All of a user's loans, newest first
    pub fn list(&self, user_id: &UserId) -> VaultResult<Vec<Loan>> {
        let rows = self.vault.storage().loans.list(user_id)?;
        let mut loans = self.vault.records().batch_decrypt_loans(rows, user_id)?;
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(loans)
    }

    pub fn update(&self, user_id: &UserId, id: &LoanId, patch: LoanPatch) -> VaultResult<Loan> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(VaultError::Validation("Loan name cannot be empty".into()));
            }
        }
        for value in [patch.total_amount, patch.outstanding_balance, patch.emi_amount]
            .into_iter()
            .flatten()
        {
            if !value.is_finite() || value < 0.0 {
                return Err(VaultError::Validation(
                    "Loan amounts must be non-negative numbers".into(),
                ));
            }
        }
        if patch.duration_months == Some(0) {
            return Err(VaultError::Validation(
                "Loan duration must be at least one month".into(),
            ));
        }

        let row = self.vault.records().encrypt_loan_data(&patch, user_id)?;
        let fields = column_names(&row);
        let updated = self
            .vault
            .storage()
            .loans
            .update(&id.key(), user_id, row)?
            .ok_or_else(|| VaultError::loan_not_found(id.to_string()))?;

        self.vault
            .storage()
            .log_update(EntityType::Loan, id.key(), user_id, fields);
        self.vault.records().decrypt_loan(updated, user_id)
    }

    pub fn delete(&self, user_id: &UserId, id: &LoanId) -> VaultResult<()> {
        if !self.vault.storage().loans.delete(&id.key(), user_id)? {
            return Err(VaultError::loan_not_found(id.to_string()));
        }
        self.vault
            .storage()
            .log_delete(EntityType::Loan, id.key(), user_id);
        info!(loan_id = %id, user_id = %user_id, "deleted loan");
        Ok(())
    }

    /// Reduce the outstanding balance by `amount`, never below zero
    pub fn record_payment(&self, user_id: &UserId, id: &LoanId, amount: f64) -> VaultResult<Loan> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(VaultError::Validation(
                "Payment must be a positive number".into(),
            ));
        }

        let attempts = self.vault.settings().balance.max_retries.max(1);
        let key = id.key();
        let storage = self.vault.storage();
        let records = self.vault.records();

        for attempt in 1..=attempts {
            let row = storage
                .loans
                .get(&key, user_id)?
                .ok_or_else(|| VaultError::loan_not_found(id.to_string()))?;
            let version = row_version(&row);
            let loan = records.decrypt_loan(row, user_id)?;

            let patch = LoanPatch {
                outstanding_balance: Some((loan.outstanding_balance - amount).max(0.0)),
                ..Default::default()
            };
            let sealed = records.encrypt_loan_data(&patch, user_id)?;

            match storage.loans.update_if_version(&key, user_id, sealed, version)? {
                CasOutcome::Updated(updated) => {
                    storage.log_update(
                        EntityType::Loan,
                        key.clone(),
                        user_id,
                        vec!["outstanding_balance".into()],
                    );
                    return records.decrypt_loan(updated, user_id);
                }
                CasOutcome::Stale { current } => {
                    debug!(loan_id = %id, attempt, current, "loan changed underneath payment, retrying");
                }
                CasOutcome::Missing => return Err(VaultError::loan_not_found(id.to_string())),
            }
        }

        warn!(loan_id = %id, attempts, "giving up on loan payment");
        Err(VaultError::Storage(format!(
            "Loan {} kept changing during payment",
            id
        )))
    }

    /// Sum of outstanding balances
    pub fn total_debt(&self, user_id: &UserId) -> VaultResult<f64> {
        Ok(self
            .list(user_id)?
            .iter()
            .map(|l| l.outstanding_balance)
            .sum())
    }
}
