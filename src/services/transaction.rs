//! Transaction service
//!
//! Every transaction moves account balances when it is written and moves
//! them back when it is deleted. Transfers are written as two linked rows
//! (outgoing on the source, incoming on the destination) that are created
//! and deleted together.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::audit::EntityType;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    AccountId, NewTransaction, Transaction, TransactionId, TransactionPatch, TransactionType,
    TransactionView, TransferLeg, UserId,
};
use crate::records::{ACCOUNT_RELATION, TO_ACCOUNT_RELATION};
use crate::storage::{column_names, Row};
use crate::vault::Vault;

/// Service for transaction management
pub struct TransactionService<'a> {
    vault: &'a Vault,
}

impl<'a> TransactionService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Record a transaction and post it to the account balance(s)
    ///
    /// For a transfer both legs are written and the outgoing leg is returned.
    pub fn create(&self, user_id: &UserId, new: NewTransaction) -> VaultResult<Transaction> {
        validate_amount(new.amount)?;
        let category = new.category.trim().to_string();
        if category.is_empty() {
            return Err(VaultError::Validation("Category cannot be empty".into()));
        }
        self.ensure_account(user_id, &new.account_id)?;

        if new.transaction_type.is_transfer() {
            let Some(destination) = new.to_account_id else {
                return Err(VaultError::Validation(
                    "A transfer needs a destination account".into(),
                ));
            };
            if destination == new.account_id {
                return Err(VaultError::Validation(
                    "Cannot transfer to the same account".into(),
                ));
            }
            self.ensure_account(user_id, &destination)?;
            return self.create_transfer(user_id, new, category, destination);
        }

        let patch = TransactionPatch {
            account_id: Some(new.account_id),
            to_account_id: new.to_account_id,
            amount: Some(new.amount),
            transaction_type: Some(new.transaction_type),
            category: Some(category),
            notes: new.notes,
            date: Some(new.date),
            ..Default::default()
        };
        let txn = self.insert(user_id, &patch, None)?;

        if let Err(e) = self.post(user_id, &txn.postings()) {
            self.discard(user_id, &txn.id);
            return Err(e);
        }

        info!(transaction_id = %txn.id, user_id = %user_id, "recorded transaction");
        Ok(txn)
    }

    fn create_transfer(
        &self,
        user_id: &UserId,
        new: NewTransaction,
        category: String,
        destination: AccountId,
    ) -> VaultResult<Transaction> {
        let outgoing_id = TransactionId::new();
        let incoming_id = TransactionId::new();
        let suffix = new
            .notes
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!(" ({})", n.trim()))
            .unwrap_or_default();

        let leg = |account_id, to_account_id, notes: String, linked, side| TransactionPatch {
            account_id: Some(account_id),
            to_account_id: Some(to_account_id),
            amount: Some(new.amount),
            transaction_type: Some(TransactionType::Transfer),
            category: Some(category.clone()),
            notes: Some(notes),
            date: Some(new.date),
            linked_transaction_id: Some(linked),
            transfer_leg: Some(side),
        };

        let outgoing = leg(
            new.account_id,
            destination,
            format!("Transfer to account{}", suffix),
            incoming_id,
            TransferLeg::Outgoing,
        );
        let incoming = leg(
            destination,
            new.account_id,
            format!("Transfer from account{}", suffix),
            outgoing_id,
            TransferLeg::Incoming,
        );

        let out_txn = self.insert(user_id, &outgoing, Some(outgoing_id))?;
        if let Err(e) = self.insert(user_id, &incoming, Some(incoming_id)) {
            self.discard(user_id, &outgoing_id);
            return Err(e);
        }

        if let Err(e) = self.post(user_id, &out_txn.postings()) {
            self.discard(user_id, &outgoing_id);
            self.discard(user_id, &incoming_id);
            return Err(e);
        }

        info!(
            transaction_id = %outgoing_id,
            linked_transaction_id = %incoming_id,
            user_id = %user_id,
            "recorded transfer"
        );
        Ok(out_txn)
    }

    fn insert(
        &self,
        user_id: &UserId,
        patch: &TransactionPatch,
        id: Option<TransactionId>,
    ) -> VaultResult<Transaction> {
        let mut row = self.vault.records().encrypt_transaction_data(patch, user_id)?;
        if let Some(id) = id {
            row.insert("id".into(), id.key().into());
        }
        let fields = column_names(&row);

        let stored = self.vault.storage().transactions.insert(user_id, row)?;
        let txn = self.vault.records().decrypt_transaction(stored, user_id)?;
        self.vault
            .storage()
            .log_create(EntityType::Transaction, txn.id.key(), user_id, fields);
        Ok(txn)
    }

    /// Best-effort removal of a row whose balance posting never happened
    fn discard(&self, user_id: &UserId, id: &TransactionId) {
        if let Err(e) = self.vault.storage().transactions.delete(&id.key(), user_id) {
            warn!(transaction_id = %id, error = %e, "failed to remove unposted transaction");
        }
    }

    /// Apply balance deltas in order, undoing the applied ones if one fails
    fn post(&self, user_id: &UserId, postings: &[(AccountId, f64)]) -> VaultResult<()> {
        let records = self.vault.records();
        let mut applied: Vec<(AccountId, f64)> = Vec::new();

        for &(account_id, delta) in postings {
            if delta == 0.0 {
                continue;
            }
            match records.adjust_balance(&account_id, user_id, delta) {
                Ok(_) => {
                    applied.push((account_id, delta));
                    self.vault.storage().log_update(
                        EntityType::Account,
                        account_id.key(),
                        user_id,
                        vec!["balance".into()],
                    );
                }
                Err(e) => {
                    for (undo_account, undo_delta) in applied.iter().rev() {
                        if let Err(undo_err) =
                            records.adjust_balance(undo_account, user_id, -undo_delta)
                        {
                            warn!(
                                account_id = %undo_account,
                                error = %undo_err,
                                "failed to roll back balance posting"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn ensure_account(&self, user_id: &UserId, id: &AccountId) -> VaultResult<()> {
        match self.vault.storage().accounts.get(&id.key(), user_id)? {
            Some(_) => Ok(()),
            None => Err(VaultError::account_not_found(id.to_string())),
        }
    }

    /// Get a transaction by ID
    pub fn get(&self, user_id: &UserId, id: &TransactionId) -> VaultResult<Option<Transaction>> {
        match self.vault.storage().transactions.get(&id.key(), user_id)? {
            Some(row) => Ok(Some(self.vault.records().decrypt_transaction(row, user_id)?)),
            None => Ok(None),
        }
    }

    /// All of a user's transactions with account names, newest first
    pub fn list(&self, user_id: &UserId) -> VaultResult<Vec<TransactionView>> {
        let storage = self.vault.storage();
        let mut rows = storage.transactions.list(user_id)?;
        storage.embed_accounts(
            user_id,
            &mut rows,
            &[
                (ACCOUNT_RELATION, "account_id"),
                (TO_ACCOUNT_RELATION, "to_account_id"),
            ],
        )?;

        let mut views = self
            .vault
            .records()
            .batch_decrypt_transaction_views(rows, user_id)?;
        views.sort_by(|a, b| {
            b.transaction
                .date
                .cmp(&a.transaction.date)
                .then(b.transaction.created_at.cmp(&a.transaction.created_at))
        });
        Ok(views)
    }

    /// The `limit` most recent transactions
    pub fn recent(&self, user_id: &UserId, limit: usize) -> VaultResult<Vec<TransactionView>> {
        let mut views = self.list(user_id)?;
        views.truncate(limit);
        Ok(views)
    }

    /// Edit a transaction, re-posting balances if the amount, type or
    /// account changed
    ///
    /// Transfer legs only accept edits to category, notes and date.
    pub fn update(
        &self,
        user_id: &UserId,
        id: &TransactionId,
        patch: TransactionPatch,
    ) -> VaultResult<Transaction> {
        let existing = self
            .get(user_id, id)?
            .ok_or_else(|| VaultError::transaction_not_found(id.to_string()))?;

        if patch.linked_transaction_id.is_some() || patch.transfer_leg.is_some() {
            return Err(VaultError::Validation(
                "Transfer links cannot be edited".into(),
            ));
        }
        if existing.transaction_type.is_transfer() && patch.touches_balances() {
            return Err(VaultError::Validation(
                "Delete and re-create a transfer to change its amount or accounts".into(),
            ));
        }
        if patch.transaction_type == Some(TransactionType::Transfer) {
            return Err(VaultError::Validation(
                "Create a new transfer instead of converting a transaction".into(),
            ));
        }
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }
        if let Some(category) = &patch.category {
            if category.trim().is_empty() {
                return Err(VaultError::Validation("Category cannot be empty".into()));
            }
        }
        if let Some(account_id) = &patch.account_id {
            self.ensure_account(user_id, account_id)?;
        }

        let mut reposting = Vec::new();
        if patch.touches_balances() {
            let mut next = existing.clone();
            patch.apply_to(&mut next);
            reposting = net_postings(&existing.postings(), &next.postings());
            self.post(user_id, &reposting)?;
        }

        let row = match self.vault.records().encrypt_transaction_data(&patch, user_id) {
            Ok(row) => row,
            Err(e) => {
                self.unpost(user_id, &reposting);
                return Err(e);
            }
        };
        let fields = column_names(&row);

        let updated = match self.vault.storage().transactions.update(&id.key(), user_id, row) {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                self.unpost(user_id, &reposting);
                return Err(VaultError::transaction_not_found(id.to_string()));
            }
            Err(e) => {
                self.unpost(user_id, &reposting);
                return Err(e);
            }
        };

        self.vault
            .storage()
            .log_update(EntityType::Transaction, id.key(), user_id, fields);
        self.vault.records().decrypt_transaction(updated, user_id)
    }

    fn unpost(&self, user_id: &UserId, postings: &[(AccountId, f64)]) {
        let reversed: Vec<_> = postings.iter().map(|&(a, d)| (a, -d)).collect();
        if let Err(e) = self.post(user_id, &reversed) {
            warn!(error = %e, "failed to roll back balance re-posting");
        }
    }

    /// Delete a transaction (both legs for a transfer) and reverse its effect
    pub fn delete(&self, user_id: &UserId, id: &TransactionId) -> VaultResult<()> {
        let txn = self
            .get(user_id, id)?
            .ok_or_else(|| VaultError::transaction_not_found(id.to_string()))?;

        let partner = if txn.transaction_type.is_transfer() {
            self.find_partner(user_id, &txn)?
        } else {
            None
        };

        let reversal: Vec<_> = txn.postings().into_iter().map(|(a, d)| (a, -d)).collect();
        self.post(user_id, &reversal)?;

        let storage = self.vault.storage();
        storage.transactions.delete(&id.key(), user_id)?;
        storage.log_delete(EntityType::Transaction, id.key(), user_id);

        if let Some(partner_id) = partner {
            storage.transactions.delete(&partner_id.key(), user_id)?;
            storage.log_delete(EntityType::Transaction, partner_id.key(), user_id);
        }

        info!(transaction_id = %id, user_id = %user_id, "deleted transaction");
        Ok(())
    }

    /// The other leg of a transfer
    ///
    /// Uses the stored link, falling back to matching accounts, date and
    /// amount for rows written without one.
    fn find_partner(&self, user_id: &UserId, txn: &Transaction) -> VaultResult<Option<TransactionId>> {
        if let Some(linked) = txn.linked_transaction_id {
            let exists = self
                .vault
                .storage()
                .transactions
                .get(&linked.key(), user_id)?
                .is_some();
            return Ok(exists.then_some(linked));
        }

        let Some(counter_account) = txn.to_account_id else {
            return Ok(None);
        };

        let rows: Vec<Row> = self
            .vault
            .storage()
            .transactions
            .list(user_id)?
            .into_iter()
            .filter(|row| {
                row.get("account_id").and_then(|v| v.as_str())
                    == Some(counter_account.key().as_str())
            })
            .collect();

        for candidate in self.vault.records().batch_decrypt_transactions(rows, user_id)? {
            if candidate.id != txn.id
                && candidate.transaction_type.is_transfer()
                && candidate.to_account_id == Some(txn.account_id)
                && candidate.date == txn.date
                && candidate.amount == txn.amount
            {
                return Ok(Some(candidate.id));
            }
        }
        Ok(None)
    }
}

fn validate_amount(amount: f64) -> VaultResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(VaultError::Validation(
            "Amount must be a positive number".into(),
        ));
    }
    Ok(())
}

/// Net per-account change of undoing `old` and applying `new`, in first-seen order
fn net_postings(old: &[(AccountId, f64)], new: &[(AccountId, f64)]) -> Vec<(AccountId, f64)> {
    let mut order = Vec::new();
    let mut totals: HashMap<AccountId, f64> = HashMap::new();

    let changes = old
        .iter()
        .map(|&(a, d)| (a, -d))
        .chain(new.iter().copied());
    for (account_id, delta) in changes {
        if !totals.contains_key(&account_id) {
            order.push(account_id);
        }
        *totals.entry(account_id).or_insert(0.0) += delta;
    }

    order
        .into_iter()
        .filter_map(|a| {
            let delta = totals.get(&a).copied().unwrap_or(0.0);
            (delta != 0.0).then_some((a, delta))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use crate::services::AccountService;
    use crate::vault::testing::test_vault;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn new_txn(account_id: AccountId, kind: TransactionType, amount: f64) -> NewTransaction {
        NewTransaction {
            account_id,
            to_account_id: None,
            amount,
            transaction_type: kind,
            category: "General".into(),
            notes: Some("Groceries".into()),
            date: date(1),
        }
    }

    #[test]
    fn test_income_and_expense_move_balance() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Main", AccountType::Savings, 1000.0)
            .unwrap();
        let service = TransactionService::new(&vault);

        service
            .create(&user, new_txn(account.id, TransactionType::Income, 200.0))
            .unwrap();
        service
            .create(&user, new_txn(account.id, TransactionType::Expense, 50.25))
            .unwrap();
        service
            .create(&user, new_txn(account.id, TransactionType::Investment, 100.0))
            .unwrap();

        let balance = vault
            .records()
            .get_decrypted_balance(&account.id, &user)
            .unwrap();
        assert_eq!(balance, 1049.75);
    }

    #[test]
    fn test_notes_and_amount_encrypted_at_rest() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let account = AccountService::new(&vault)
            .create(&user, "Main", AccountType::Savings, 0.0)
            .unwrap();
        let service = TransactionService::new(&vault);
        let txn = service
            .create(&user, new_txn(account.id, TransactionType::Expense, 40.0))
            .unwrap();

        let raw = vault
            .storage()
            .transactions
            .get(&txn.id.key(), &user)
            .unwrap()
            .unwrap();
        assert_ne!(raw["notes"], "Groceries");
        assert!(raw["amount"].is_string());
        assert_ne!(raw["category"], "General");
        assert_eq!(raw["type"], "EXPENSE");

        assert_eq!(txn.notes.as_deref(), Some("Groceries"));
        assert_eq!(txn.amount, 40.0);
    }

    #[test]
    fn test_transfer_creates_linked_pair() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&user, "A", AccountType::Savings, 500.0).unwrap();
        let b = accounts.create(&user, "B", AccountType::Wallet, 0.0).unwrap();
        let service = TransactionService::new(&vault);

        let mut new = new_txn(a.id, TransactionType::Transfer, 120.0);
        new.to_account_id = Some(b.id);
        new.notes = Some("rent".into());
        let out = service.create(&user, new).unwrap();

        assert_eq!(out.notes.as_deref(), Some("Transfer to account (rent)"));
        let incoming = service
            .get(&user, &out.linked_transaction_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(incoming.account_id, b.id);
        assert_eq!(incoming.to_account_id, Some(a.id));
        assert_eq!(incoming.notes.as_deref(), Some("Transfer from account (rent)"));
        assert_eq!(incoming.linked_transaction_id, Some(out.id));

        assert_eq!(accounts.balance(&user, &a.id).unwrap(), 380.0);
        assert_eq!(accounts.balance(&user, &b.id).unwrap(), 120.0);
    }

    #[test]
    fn test_deleting_either_transfer_leg_restores_both_balances() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&user, "A", AccountType::Savings, 500.0).unwrap();
        let b = accounts.create(&user, "B", AccountType::Wallet, 10.0).unwrap();
        let service = TransactionService::new(&vault);

        let mut new = new_txn(a.id, TransactionType::Transfer, 75.0);
        new.to_account_id = Some(b.id);
        let out = service.create(&user, new).unwrap();

        // delete via the incoming leg
        service
            .delete(&user, &out.linked_transaction_id.unwrap())
            .unwrap();

        assert_eq!(accounts.balance(&user, &a.id).unwrap(), 500.0);
        assert_eq!(accounts.balance(&user, &b.id).unwrap(), 10.0);
        assert!(service.list(&user).unwrap().is_empty());
    }

    #[test]
    fn test_transfer_validation() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let a = AccountService::new(&vault)
            .create(&user, "A", AccountType::Savings, 0.0)
            .unwrap();
        let service = TransactionService::new(&vault);

        let no_dest = new_txn(a.id, TransactionType::Transfer, 5.0);
        assert!(matches!(
            service.create(&user, no_dest),
            Err(VaultError::Validation(_))
        ));

        let mut to_self = new_txn(a.id, TransactionType::Transfer, 5.0);
        to_self.to_account_id = Some(a.id);
        assert!(matches!(
            service.create(&user, to_self),
            Err(VaultError::Validation(_))
        ));

        let mut to_ghost = new_txn(a.id, TransactionType::Transfer, 5.0);
        to_ghost.to_account_id = Some(AccountId::new());
        assert!(matches!(
            service.create(&user, to_ghost),
            Err(VaultError::AccountNotFound(_))
        ));
        assert!(service.list(&user).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let a = AccountService::new(&vault)
            .create(&user, "A", AccountType::Savings, 0.0)
            .unwrap();
        let service = TransactionService::new(&vault);

        for amount in [0.0, -5.0, f64::NAN] {
            assert!(service
                .create(&user, new_txn(a.id, TransactionType::Income, amount))
                .is_err());
        }
    }

    #[test]
    fn test_delete_reverses_expense() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&user, "A", AccountType::Savings, 100.0).unwrap();
        let service = TransactionService::new(&vault);
        let txn = service
            .create(&user, new_txn(a.id, TransactionType::Expense, 30.0))
            .unwrap();

        service.delete(&user, &txn.id).unwrap();

        assert_eq!(accounts.balance(&user, &a.id).unwrap(), 100.0);
        assert!(matches!(
            service.delete(&user, &txn.id),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_amount_reposts_difference() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&user, "A", AccountType::Savings, 1000.0).unwrap();
        let service = TransactionService::new(&vault);
        let txn = service
            .create(&user, new_txn(a.id, TransactionType::Expense, 40.0))
            .unwrap();

        let updated = service
            .update(
                &user,
                &txn.id,
                TransactionPatch {
                    amount: Some(50.0),
                    notes: Some("Bigger shop".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.amount, 50.0);
        assert_eq!(updated.notes.as_deref(), Some("Bigger shop"));
        assert_eq!(accounts.balance(&user, &a.id).unwrap(), 950.0);
    }

    #[test]
    fn test_update_type_flips_sign() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&user, "A", AccountType::Savings, 100.0).unwrap();
        let service = TransactionService::new(&vault);
        let txn = service
            .create(&user, new_txn(a.id, TransactionType::Expense, 10.0))
            .unwrap();

        service
            .update(
                &user,
                &txn.id,
                TransactionPatch {
                    transaction_type: Some(TransactionType::Income),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(accounts.balance(&user, &a.id).unwrap(), 110.0);
    }

    #[test]
    fn test_transfer_amount_cannot_be_edited() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let accounts = AccountService::new(&vault);
        let a = accounts.create(&user, "A", AccountType::Savings, 100.0).unwrap();
        let b = accounts.create(&user, "B", AccountType::Savings, 0.0).unwrap();
        let service = TransactionService::new(&vault);
        let mut new = new_txn(a.id, TransactionType::Transfer, 10.0);
        new.to_account_id = Some(b.id);
        let out = service.create(&user, new).unwrap();

        let err = service
            .update(
                &user,
                &out.id,
                TransactionPatch {
                    amount: Some(20.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));

        let renamed = service
            .update(
                &user,
                &out.id,
                TransactionPatch {
                    category: Some("Savings".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.category, "Savings");
    }

    #[test]
    fn test_list_embeds_account_names_newest_first() {
        let (_temp, vault) = test_vault();
        let user = UserId::from("u1");
        let a = AccountService::new(&vault)
            .create(&user, "Everyday", AccountType::Cash, 0.0)
            .unwrap();
        let service = TransactionService::new(&vault);

        let mut early = new_txn(a.id, TransactionType::Income, 1.0);
        early.date = date(1);
        let mut late = new_txn(a.id, TransactionType::Income, 2.0);
        late.date = date(20);
        service.create(&user, early).unwrap();
        service.create(&user, late).unwrap();

        let views = service.list(&user).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].transaction.date, date(20));
        assert_eq!(views[0].account.as_ref().unwrap().name, "Everyday");
        assert!(views[0].to_account.is_none());

        assert_eq!(service.recent(&user, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_net_postings() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_eq!(net_postings(&[(a, -40.0)], &[(a, -50.0)]), vec![(a, -10.0)]);
        assert_eq!(net_postings(&[(a, -40.0)], &[(a, -40.0)]), vec![]);
        assert_eq!(
            net_postings(&[(a, -40.0)], &[(b, -40.0)]),
            vec![(a, 40.0), (b, -40.0)]
        );
    }
}
