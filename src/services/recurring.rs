//! Recurring transaction service
//!
//! Rules are stored with a plaintext `next_due_date` so the processing run
//! can pick due rules without decrypting anything. Each due rule posts one
//! transaction per run and moves its due date forward one period.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::audit::EntityType;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    AccountId, NewRecurring, NewTransaction, RecurringId, RecurringOutcome, RecurringPatch,
    RecurringRun, RecurringTransaction, RecurringView, UserId,
};
use crate::records::ACCOUNT_RELATION;
use crate::storage::{column_names, row_owner, Row};
use crate::vault::Vault;

use super::TransactionService;

/// Service for recurring transaction rules
pub struct RecurringService<'a> {
    vault: &'a Vault,
}

impl<'a> RecurringService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Create a rule; its first occurrence is one period after `start_date`
    pub fn create(&self, user_id: &UserId, new: NewRecurring) -> VaultResult<RecurringTransaction> {
        if !new.amount.is_finite() || new.amount <= 0.0 {
            return Err(VaultError::Validation(
                "Amount must be a positive number".into(),
            ));
        }
        let description = new.description.trim().to_string();
        if description.is_empty() {
            return Err(VaultError::Validation("Description cannot be empty".into()));
        }
        if new.transaction_type.is_transfer() && new.to_account_id.is_none() {
            return Err(VaultError::Validation(
                "A recurring transfer needs a destination account".into(),
            ));
        }
        self.ensure_account(user_id, &new.account_id)?;
        if let Some(to) = &new.to_account_id {
            self.ensure_account(user_id, to)?;
        }

        let next_due_date = new.frequency.advance(new.start_date).ok_or_else(|| {
            VaultError::Validation("Start date is too far in the future".into())
        })?;

        let patch = RecurringPatch {
            account_id: Some(new.account_id),
            to_account_id: new.to_account_id,
            description: Some(description),
            amount: Some(new.amount),
            transaction_type: Some(new.transaction_type),
            category: Some(new.category.trim().to_string()),
            frequency: Some(new.frequency),
            start_date: Some(new.start_date),
            next_due_date: Some(next_due_date),
        };
        let row = self.vault.records().encrypt_recurring_data(&patch, user_id)?;
        let fields = column_names(&row);

        let stored = self.vault.storage().recurring.insert(user_id, row)?;
        let rule = self.vault.records().decrypt_recurring(stored, user_id)?;

        self.vault.storage().log_create(
            EntityType::RecurringTransaction,
            rule.id.key(),
            user_id,
            fields,
        );
        info!(recurring_id = %rule.id, user_id = %user_id, %next_due_date, "created recurring rule");
        Ok(rule)
    }

    fn ensure_account(&self, user_id: &UserId, id: &AccountId) -> VaultResult<()> {
        match self.vault.storage().accounts.get(&id.key(), user_id)? {
            Some(_) => Ok(()),
            None => Err(VaultError::account_not_found(id.to_string())),
        }
    }

    pub fn get(&self, user_id: &UserId, id: &RecurringId) -> VaultResult<Option<RecurringTransaction>> {
        match self.vault.storage().recurring.get(&id.key(), user_id)? {
            Some(row) => Ok(Some(self.vault.records().decrypt_recurring(row, user_id)?)),
            None => Ok(None),
        }
    }

    /// All of a user's rules with their account, soonest due first
    pub fn list(&self, user_id: &UserId) -> VaultResult<Vec<RecurringView>> {
        let storage = self.vault.storage();
        let mut rows = storage.recurring.list(user_id)?;
        storage.embed_accounts(user_id, &mut rows, &[(ACCOUNT_RELATION, "account_id")])?;

        let mut views = self
            .vault
            .records()
            .batch_decrypt_recurring_views(rows, user_id)?;
        views.sort_by(|a, b| a.recurring.next_due_date.cmp(&b.recurring.next_due_date));
        Ok(views)
    }

    /// Apply a patch; a new frequency or start date reschedules the rule
    /// unless the patch sets `next_due_date` itself
    pub fn update(
        &self,
        user_id: &UserId,
        id: &RecurringId,
        mut patch: RecurringPatch,
    ) -> VaultResult<RecurringTransaction> {
        if let Some(description) = patch.description.as_mut() {
            *description = description.trim().to_string();
            if description.is_empty() {
                return Err(VaultError::Validation("Description cannot be empty".into()));
            }
        }
        if let Some(amount) = patch.amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(VaultError::Validation(
                    "Amount must be a positive number".into(),
                ));
            }
        }
        if let Some(account_id) = &patch.account_id {
            self.ensure_account(user_id, account_id)?;
        }

        let reschedules = patch.frequency.is_some() || patch.start_date.is_some();
        if reschedules && patch.next_due_date.is_none() {
            let current = self
                .get(user_id, id)?
                .ok_or_else(|| VaultError::recurring_not_found(id.to_string()))?;
            let frequency = patch.frequency.unwrap_or(current.frequency);
            let start_date = patch.start_date.unwrap_or(current.start_date);
            let next_due_date = frequency.advance(start_date).ok_or_else(|| {
                VaultError::Validation("Start date is too far in the future".into())
            })?;
            patch.next_due_date = Some(next_due_date);
        }

        let row = self.vault.records().encrypt_recurring_data(&patch, user_id)?;
        let fields = column_names(&row);
        let updated = self
            .vault
            .storage()
            .recurring
            .update(&id.key(), user_id, row)?
            .ok_or_else(|| VaultError::recurring_not_found(id.to_string()))?;

        self.vault.storage().log_update(
            EntityType::RecurringTransaction,
            id.key(),
            user_id,
            fields,
        );
        self.vault.records().decrypt_recurring(updated, user_id)
    }

    pub fn delete(&self, user_id: &UserId, id: &RecurringId) -> VaultResult<()> {
        if !self.vault.storage().recurring.delete(&id.key(), user_id)? {
            return Err(VaultError::recurring_not_found(id.to_string()));
        }
        self.vault
            .storage()
            .log_delete(EntityType::RecurringTransaction, id.key(), user_id);
        Ok(())
    }

    /// Post every rule (across all users) due on or before `today`
    ///
    /// One rule failing never stops the others; each gets its own outcome.
    pub fn process_due(&self, today: NaiveDate) -> VaultResult<Vec<RecurringRun>> {
        let due: Vec<Row> = self
            .vault
            .storage()
            .recurring
            .list_all()?
            .into_iter()
            .filter(|row| due_date(row).is_some_and(|d| d <= today))
            .collect();

        info!(count = due.len(), %today, "processing due recurring transactions");

        let mut runs = Vec::with_capacity(due.len());
        for row in due {
            let (Some(user_id), Some(due_date)) = (row_owner(&row), due_date(&row)) else {
                continue;
            };
            let Some(recurring_id) = row
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<RecurringId>().ok())
            else {
                warn!("skipping recurring row without a valid id");
                continue;
            };

            let outcome = self.process_one(row, &user_id, due_date);
            match &outcome {
                RecurringOutcome::Success => {}
                RecurringOutcome::Partial(reason) | RecurringOutcome::Failed(reason) => {
                    warn!(recurring_id = %recurring_id, user_id = %user_id, reason = %reason, "recurring rule did not complete");
                }
            }
            runs.push(RecurringRun {
                recurring_id,
                user_id,
                due_date,
                outcome,
            });
        }
        Ok(runs)
    }

    fn process_one(&self, row: Row, user_id: &UserId, due_date: NaiveDate) -> RecurringOutcome {
        let rule = match self.vault.records().decrypt_recurring(row, user_id) {
            Ok(rule) => rule,
            Err(e) => return RecurringOutcome::Failed(e.to_string()),
        };

        let posted = TransactionService::new(self.vault).create(
            user_id,
            NewTransaction {
                account_id: rule.account_id,
                to_account_id: rule.to_account_id,
                amount: rule.amount,
                transaction_type: rule.transaction_type,
                category: rule.category.clone(),
                notes: Some(format!("{} (Recurring)", rule.description)),
                date: due_date,
            },
        );
        if let Err(e) = posted {
            return RecurringOutcome::Failed(e.to_string());
        }

        let Some(next_due_date) = rule.frequency.advance(due_date) else {
            return RecurringOutcome::Partial("next due date out of range".into());
        };
        let patch = RecurringPatch {
            next_due_date: Some(next_due_date),
            ..Default::default()
        };
        let advanced = self
            .vault
            .records()
            .encrypt_recurring_data(&patch, user_id)
            .and_then(|row| self.vault.storage().recurring.update(&rule.id.key(), user_id, row));
        match advanced {
            Ok(Some(_)) => {
                self.vault.storage().log_update(
                    EntityType::RecurringTransaction,
                    rule.id.key(),
                    user_id,
                    vec!["next_due_date".into()],
                );
                RecurringOutcome::Success
            }
            Ok(None) => RecurringOutcome::Partial("rule disappeared before it could advance".into()),
            Err(e) => RecurringOutcome::Partial(e.to_string()),
        }
    }
}

fn due_date(row: &Row) -> Option<NaiveDate> {
    row.get("next_due_date")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, Frequency, TransactionType};
    use crate::services::AccountService;
    use crate::vault::testing::test_vault;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn salary(account_id: AccountId) -> NewRecurring {
        NewRecurring {
            account_id,
            to_account_id: None,
            description: "Salary".into(),
            amount: 50000.0,
            transaction_type: TransactionType::Income,
            category: "Salary".into(),
            frequency: Frequency::Monthly,
            start_date: date(2025, 1, 31),
        }
    }

    #[test]
    fn test_create_sets_next_due() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Bank", AccountType::Savings, 0.0)
            .unwrap();
        let service = RecurringService::new(&vault);

        let rule = service.create(&user, salary(account.id)).unwrap();
        assert_eq!(rule.next_due_date, date(2025, 2, 28));

        let raw = vault
            .storage()
            .recurring
            .get(&rule.id.key(), &user)
            .unwrap()
            .unwrap();
        assert_ne!(raw["description"], "Salary");
        assert!(raw["amount"].is_string());
        assert_eq!(raw["next_due_date"], "2025-02-28");
    }

    #[test]
    fn test_list_includes_account_name() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Bank", AccountType::Savings, 0.0)
            .unwrap();
        let service = RecurringService::new(&vault);
        service.create(&user, salary(account.id)).unwrap();

        let views = service.list(&user).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].recurring.description, "Salary");
        assert_eq!(views[0].account.as_ref().unwrap().name, "Bank");
    }

    #[test]
    fn test_update_schedule_moves_next_due() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Bank", AccountType::Savings, 0.0)
            .unwrap();
        let service = RecurringService::new(&vault);
        let rule = service.create(&user, salary(account.id)).unwrap();

        let yearly = RecurringPatch {
            frequency: Some(Frequency::Yearly),
            ..Default::default()
        };
        let rule_after = service.update(&user, &rule.id, yearly).unwrap();
        assert_eq!(rule_after.next_due_date, date(2026, 1, 31));

        let restarted = RecurringPatch {
            start_date: Some(date(2025, 6, 10)),
            ..Default::default()
        };
        let rule_after = service.update(&user, &rule.id, restarted).unwrap();
        assert_eq!(rule_after.frequency, Frequency::Yearly);
        assert_eq!(rule_after.next_due_date, date(2026, 6, 10));

        let explicit = RecurringPatch {
            frequency: Some(Frequency::Monthly),
            next_due_date: Some(date(2025, 9, 1)),
            ..Default::default()
        };
        let rule_after = service.update(&user, &rule.id, explicit).unwrap();
        assert_eq!(rule_after.next_due_date, date(2025, 9, 1));

        let renamed = RecurringPatch {
            description: Some("Pay".into()),
            ..Default::default()
        };
        let rule_after = service.update(&user, &rule.id, renamed).unwrap();
        assert_eq!(rule_after.next_due_date, date(2025, 9, 1));
    }

    #[test]
    fn test_update_rejects_blank_description() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Bank", AccountType::Savings, 0.0)
            .unwrap();
        let service = RecurringService::new(&vault);
        let rule = service.create(&user, salary(account.id)).unwrap();

        let blank = RecurringPatch {
            description: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&user, &rule.id, blank),
            Err(VaultError::Validation(_))
        ));
        assert_eq!(
            service.get(&user, &rule.id).unwrap().unwrap().description,
            "Salary"
        );

        let padded = RecurringPatch {
            description: Some("  Bonus ".into()),
            ..Default::default()
        };
        let rule_after = service.update(&user, &rule.id, padded).unwrap();
        assert_eq!(rule_after.description, "Bonus");
    }

    #[test]
    fn test_process_due_posts_and_advances() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let account = accounts
            .create(&user, "Bank", AccountType::Savings, 100.0)
            .unwrap();
        let service = RecurringService::new(&vault);
        let rule = service.create(&user, salary(account.id)).unwrap();

        // not due yet
        assert!(service.process_due(date(2025, 2, 27)).unwrap().is_empty());

        let runs = service.process_due(date(2025, 3, 1)).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, RecurringOutcome::Success);
        assert_eq!(runs[0].due_date, date(2025, 2, 28));

        assert_eq!(accounts.balance(&user, &account.id).unwrap(), 50100.0);
        let txns = TransactionService::new(&vault).list(&user).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(
            txns[0].transaction.notes.as_deref(),
            Some("Salary (Recurring)")
        );
        assert_eq!(txns[0].transaction.date, date(2025, 2, 28));

        let advanced = service.get(&user, &rule.id).unwrap().unwrap();
        assert_eq!(advanced.next_due_date, date(2025, 3, 28));

        // same day again is a no-op
        assert!(service.process_due(date(2025, 3, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_process_due_isolates_failures() {
        let (_temp, vault) = test_vault();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&alice, "A", AccountType::Savings, 0.0).unwrap();
        let b = accounts.create(&bob, "B", AccountType::Savings, 0.0).unwrap();
        let service = RecurringService::new(&vault);
        let broken = service.create(&alice, salary(a.id)).unwrap();
        service.create(&bob, salary(b.id)).unwrap();

        // corrupt alice's amount so her rule cannot be decrypted
        let mut patch = Row::new();
        patch.insert("amount".into(), Value::from("not-ciphertext"));
        vault
            .storage()
            .recurring
            .update(&broken.id.key(), &alice, patch)
            .unwrap();

        let runs = service.process_due(date(2025, 3, 1)).unwrap();
        assert_eq!(runs.len(), 2);
        let alice_run = runs.iter().find(|r| r.user_id == alice).unwrap();
        let bob_run = runs.iter().find(|r| r.user_id == bob).unwrap();
        assert!(matches!(alice_run.outcome, RecurringOutcome::Failed(_)));
        assert_eq!(bob_run.outcome, RecurringOutcome::Success);
        assert_eq!(accounts.balance(&bob, &b.id).unwrap(), 50000.0);
        assert_eq!(accounts.balance(&alice, &a.id).unwrap(), 0.0);
    }

    #[test]
    fn test_recurring_transfer_requires_destination() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Bank", AccountType::Savings, 0.0)
            .unwrap();
        let mut rule = salary(account.id);
        rule.transaction_type = TransactionType::Transfer;

        assert!(matches!(
            RecurringService::new(&vault).create(&user, rule),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn test_delete() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Bank", AccountType::Savings, 0.0)
            .unwrap();
        let service = RecurringService::new(&vault);
        let rule = service.create(&user, salary(account.id)).unwrap();

        service.delete(&user, &rule.id).unwrap();
        assert!(service.get(&user, &rule.id).unwrap().is_none());
        assert!(service.delete(&user, &rule.id).is_err());
    }
}
