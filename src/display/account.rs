//! Account display formatting
//!
//! Formats accounts for terminal output in table and detail views.

use crate::models::Account;

use super::format_amount;

/// Format a list of accounts with balances as a table
pub fn format_account_list(accounts: &[Account], currency: &str) -> String {
    if accounts.is_empty() {
        return "No accounts found.\n".to_string();
    }

    let name_width = accounts
        .iter()
        .map(|a| a.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(5);
    let type_width = 11;

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<name_width$}  {:<type_width$}  {:>18}\n",
        "ID",
        "Name",
        "Type",
        "Balance",
        name_width = name_width,
        type_width = type_width,
    ));
    output.push_str(&format!(
        "{:-<12}  {:-<name_width$}  {:-<type_width$}  {:->18}\n",
        "",
        "",
        "",
        "",
        name_width = name_width,
        type_width = type_width,
    ));

    for account in accounts {
        output.push_str(&format!(
            "{:<12}  {:<name_width$}  {:<type_width$}  {:>18}\n",
            account.id.to_string(),
            account.name,
            account.account_type.to_string(),
            format_amount(account.balance, currency),
            name_width = name_width,
            type_width = type_width,
        ));
    }

    let total: f64 = accounts.iter().map(|a| a.balance).sum();
    output.push_str(&format!(
        "{:<12}  {:<name_width$}  {:<type_width$}  {:>18}\n",
        "",
        "TOTAL",
        "",
        format_amount(total, currency),
        name_width = name_width,
        type_width = type_width,
    ));

    output
}

/// Format a single account's details
pub fn format_account_details(account: &Account, currency: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Account: {}\n", account.name));
    output.push_str(&format!("  Type:     {}\n", account.account_type));
    output.push_str(&format!("  ID:       {}\n", account.id.key()));
    output.push_str(&format!(
        "  Balance:  {}\n",
        format_amount(account.balance, currency)
    ));
    output.push_str(&format!(
        "  Created:  {}\n",
        account.created_at.format("%Y-%m-%d %H:%M UTC")
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, AccountType, UserId};
    use chrono::Utc;

    fn account(name: &str, balance: f64) -> Account {
        Account {
            id: AccountId::new(),
            user_id: UserId::from("u1"),
            name: name.into(),
            account_type: AccountType::Savings,
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_account_list() {
        let output = format_account_list(
            &[account("Checking", 1000.0), account("Savings", 5000.0)],
            "INR",
        );
        assert!(output.contains("Checking"));
        assert!(output.contains("Savings"));
        assert!(output.contains("TOTAL"));
        assert!(output.contains("INR 6,000.00"));
    }

    #[test]
    fn test_format_empty_list() {
        assert!(format_account_list(&[], "INR").contains("No accounts found"));
    }

    #[test]
    fn test_format_account_details() {
        let acc = account("My Account", 99.5);
        let output = format_account_details(&acc, "USD");
        assert!(output.contains("My Account"));
        assert!(output.contains("Savings"));
        assert!(output.contains("USD 99.50"));
        assert!(output.contains(&acc.id.key()));
    }
}
