//! Account service
//!
//! Creates, lists, renames and deletes accounts. Balances only ever move
//! through [`RecordCipher::adjust_balance`](crate::records::RecordCipher::adjust_balance)
//! once an account exists.

use tracing::info;

use crate::audit::EntityType;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    Account, AccountId, AccountPatch, AccountType, AccountValidationError, UserId,
};
use crate::storage::column_names;
use crate::vault::Vault;

/// Service for account management
pub struct AccountService<'a> {
    vault: &'a Vault,
}

impl<'a> AccountService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Create a new account with an opening balance
    pub fn create(
        &self,
        user_id: &UserId,
        name: &str,
        account_type: AccountType,
        opening_balance: f64,
    ) -> VaultResult<Account> {
        let name = name.trim();
        Account::validate_name(name).map_err(|e| VaultError::Validation(e.to_string()))?;
        if !opening_balance.is_finite() {
            return Err(VaultError::Validation(
                AccountValidationError::NonFiniteBalance.to_string(),
            ));
        }

        let patch = AccountPatch {
            name: Some(name.to_string()),
            account_type: Some(account_type),
            balance: Some(opening_balance),
        };
        let row = self.vault.records().encrypt_account_data(&patch, user_id)?;
        let fields = column_names(&row);

        let stored = self.vault.storage().accounts.insert(user_id, row)?;
        let account = self.vault.records().decrypt_account(stored, user_id)?;

        self.vault
            .storage()
            .log_create(EntityType::Account, account.id.key(), user_id, fields);
        info!(account_id = %account.id, user_id = %user_id, "created account");

        Ok(account)
    }

    /// Get an account by ID
    pub fn get(&self, user_id: &UserId, id: &AccountId) -> VaultResult<Option<Account>> {
        match self.vault.storage().accounts.get(&id.key(), user_id)? {
            Some(row) => Ok(Some(self.vault.records().decrypt_account(row, user_id)?)),
            None => Ok(None),
        }
    }

    /// Find an account by full ID or by name (case-insensitive)
    pub fn find(&self, user_id: &UserId, identifier: &str) -> VaultResult<Option<Account>> {
        if let Ok(id) = identifier.parse::<AccountId>() {
            if let Some(account) = self.get(user_id, &id)? {
                return Ok(Some(account));
            }
        }

        let wanted = identifier.trim().to_lowercase();
        Ok(self
            .list(user_id)?
            .into_iter()
            .find(|a| a.name.to_lowercase() == wanted))
    }

    /// All of a user's accounts, newest first
    pub fn list(&self, user_id: &UserId) -> VaultResult<Vec<Account>> {
        let rows = self.vault.storage().accounts.list(user_id)?;
        let mut accounts = self.vault.records().batch_decrypt_accounts(rows, user_id)?;
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        Ok(accounts)
    }

    /// Rename or retype an account
    pub fn update(
        &self,
        user_id: &UserId,
        id: &AccountId,
        name: Option<&str>,
        account_type: Option<AccountType>,
    ) -> VaultResult<Account> {
        let name = name.map(str::trim);
        if let Some(name) = name {
            Account::validate_name(name).map_err(|e| VaultError::Validation(e.to_string()))?;
        }

        let patch = AccountPatch {
            name: name.map(str::to_string),
            account_type,
            balance: None,
        };
        let row = self.vault.records().encrypt_account_data(&patch, user_id)?;
        let fields = column_names(&row);

        let updated = self
            .vault
            .storage()
            .accounts
            .update(&id.key(), user_id, row)?
            .ok_or_else(|| VaultError::account_not_found(id.to_string()))?;

        self.vault
            .storage()
            .log_update(EntityType::Account, id.key(), user_id, fields);

        self.vault.records().decrypt_account(updated, user_id)
    }

    /// Delete an account with its transactions and recurring rules
    pub fn delete(&self, user_id: &UserId, id: &AccountId) -> VaultResult<()> {
        let storage = self.vault.storage();
        if storage.accounts.get(&id.key(), user_id)?.is_none() {
            return Err(VaultError::account_not_found(id.to_string()));
        }

        let key = id.key();
        let references = |row: &crate::storage::Row| {
            ["account_id", "to_account_id"]
                .iter()
                .any(|col| row.get(*col).and_then(|v| v.as_str()) == Some(key.as_str()))
        };

        for row in storage.transactions.list(user_id)? {
            if references(&row) {
                if let Some(txn_key) = row.get("id").and_then(|v| v.as_str()) {
                    storage.transactions.delete(txn_key, user_id)?;
                }
            }
        }
        for row in storage.recurring.list(user_id)? {
            if references(&row) {
                if let Some(rec_key) = row.get("id").and_then(|v| v.as_str()) {
                    storage.recurring.delete(rec_key, user_id)?;
                }
            }
        }

        storage.accounts.delete(&key, user_id)?;
        self.vault.records().forget_account(id);
        storage.log_delete(EntityType::Account, key, user_id);
        info!(account_id = %id, user_id = %user_id, "deleted account");
        Ok(())
    }

    /// Current decrypted balance of one account
    pub fn balance(&self, user_id: &UserId, id: &AccountId) -> VaultResult<f64> {
        self.vault.records().get_decrypted_balance(id, user_id)
    }

    /// Sum of all account balances
    pub fn total_balance(&self, user_id: &UserId) -> VaultResult<f64> {
        Ok(self.list(user_id)?.iter().map(|a| a.balance).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::testing::test_vault;

    #[test]
    fn test_create_account() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let user = UserId::from("u1");

        let account = service
            .create(&user, "  Checking  ", AccountType::Savings, 1000.0)
            .unwrap();

        assert_eq!(account.name, "Checking");
        assert_eq!(account.balance, 1000.0);
        assert_eq!(service.balance(&user, &account.id).unwrap(), 1000.0);
    }

    #[test]
    fn test_name_and_balance_are_not_stored_in_the_clear() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let user = UserId::from("u1");
        service
            .create(&user, "Secret Stash", AccountType::Cash, 4321.5)
            .unwrap();

        let on_disk =
            std::fs::read_to_string(vault.storage().paths().table_file("financial_accounts"))
                .unwrap();
        assert!(!on_disk.contains("Secret Stash"));
        assert!(!on_disk.contains("4321.5"));
        assert!(on_disk.contains("CASH"));
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);

        let err = service
            .create(&UserId::from("u1"), "   ", AccountType::Cash, 0.0)
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[test]
    fn test_find_by_name_and_id() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let user = UserId::from("u1");
        let account = service
            .create(&user, "Wallet", AccountType::Wallet, 0.0)
            .unwrap();

        assert_eq!(service.find(&user, "wallet").unwrap().unwrap().id, account.id);
        assert_eq!(
            service.find(&user, &account.id.key()).unwrap().unwrap().id,
            account.id
        );
        assert!(service.find(&user, "nothing").unwrap().is_none());
    }

    #[test]
    fn test_users_cannot_see_each_other() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let account = service
            .create(&alice, "Alice's", AccountType::Savings, 10.0)
            .unwrap();

        assert!(service.list(&bob).unwrap().is_empty());
        assert!(service.get(&bob, &account.id).unwrap().is_none());
    }

    #[test]
    fn test_update_keeps_balance() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let user = UserId::from("u1");
        let account = service
            .create(&user, "Old", AccountType::Savings, 99.5)
            .unwrap();

        let updated = service
            .update(&user, &account.id, Some("New"), Some(AccountType::Wallet))
            .unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.account_type, AccountType::Wallet);
        assert_eq!(updated.balance, 99.5);
    }

    #[test]
    fn test_delete_cascades_to_transactions() {
        let (_temp, vault) = test_vault();
        let accounts = AccountService::new(&vault);
        let user = UserId::from("u1");
        let account = accounts
            .create(&user, "Gone", AccountType::Cash, 0.0)
            .unwrap();

        let txns = crate::services::TransactionService::new(&vault);
        txns.create(
            &user,
            crate::models::NewTransaction {
                account_id: account.id,
                to_account_id: None,
                amount: 5.0,
                transaction_type: crate::models::TransactionType::Income,
                category: "Gift".into(),
                notes: None,
                date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            },
        )
        .unwrap();

        accounts.delete(&user, &account.id).unwrap();

        assert!(accounts.list(&user).unwrap().is_empty());
        assert!(txns.list(&user).unwrap().is_empty());
        assert!(matches!(
            accounts.delete(&user, &account.id),
            Err(VaultError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_total_balance() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let user = UserId::from("u1");
        service.create(&user, "A", AccountType::Savings, 100.25).unwrap();
        service.create(&user, "B", AccountType::Cash, 50.0).unwrap();

        assert_eq!(service.total_balance(&user).unwrap(), 150.25);
    }

    #[test]
    fn test_create_is_audited_without_values() {
        let (_temp, vault) = test_vault();
        let service = AccountService::new(&vault);
        let user = UserId::from("u1");
        service
            .create(&user, "Audited", AccountType::Savings, 12.0)
            .unwrap();

        let entries = vault.storage().audit().unwrap().read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].fields.contains(&"name".to_string()));
        let log = std::fs::read_to_string(vault.storage().paths().audit_log()).unwrap();
        assert!(!log.contains("Audited"));
    }
}
