//! Transaction display formatting
//!
//! Register view and detail view for decrypted transactions.

use crate::models::{Transaction, TransactionType, TransactionView, TransferLeg};

use super::{format_amount, truncate};

/// Amount with the sign it had on its own account
fn signed_amount(txn: &Transaction) -> f64 {
    match txn.transaction_type {
        TransactionType::Income => txn.amount,
        TransactionType::Expense | TransactionType::Investment => -txn.amount,
        TransactionType::Transfer => match txn.leg() {
            TransferLeg::Outgoing => -txn.amount,
            TransferLeg::Incoming => txn.amount,
        },
    }
}

/// Format a single transaction for display (register row)
pub fn format_transaction_row(view: &TransactionView, currency: &str) -> String {
    let txn = &view.transaction;
    let transfer_indicator = if txn.transaction_type.is_transfer() {
        "⇄ "
    } else {
        ""
    };
    let account = view
        .account
        .as_ref()
        .map(|a| a.name.as_str())
        .unwrap_or("(deleted)");

    format!(
        "{:<13} {} {:16} {:18} {:>18}",
        txn.id.to_string(),
        txn.date.format("%Y-%m-%d"),
        truncate(account, 16),
        truncate(&format!("{}{}", transfer_indicator, txn.category), 18),
        format_amount(signed_amount(txn), currency),
    )
}

/// Format a list of transactions as a register
pub fn format_transaction_register(views: &[TransactionView], currency: &str) -> String {
    if views.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<13} {:10} {:16} {:18} {:>18}\n",
        "ID", "Date", "Account", "Category", "Amount"
    ));
    output.push_str(&"-".repeat(79));
    output.push('\n');

    for view in views {
        output.push_str(&format_transaction_row(view, currency));
        output.push('\n');
    }

    output
}

/// Format transaction details for display
pub fn format_transaction_details(view: &TransactionView, currency: &str) -> String {
    let txn = &view.transaction;
    let mut output = String::new();

    output.push_str(&format!("Transaction: {}\n", txn.id.key()));
    output.push_str(&format!("Date:        {}\n", txn.date.format("%Y-%m-%d")));
    output.push_str(&format!("Type:        {}\n", txn.transaction_type));
    output.push_str(&format!(
        "Amount:      {}\n",
        format_amount(txn.amount, currency)
    ));
    output.push_str(&format!("Category:    {}\n", txn.category));

    if let Some(account) = &view.account {
        output.push_str(&format!("Account:     {}\n", account.name));
    }
    if let Some(to_account) = &view.to_account {
        let label = match txn.leg() {
            TransferLeg::Outgoing => "To:",
            TransferLeg::Incoming => "From:",
        };
        output.push_str(&format!("{:<12} {}\n", label, to_account.name));
    }
    if let Some(notes) = txn.notes.as_deref().filter(|n| !n.is_empty()) {
        output.push_str(&format!("Notes:       {}\n", notes));
    }

    output
}
