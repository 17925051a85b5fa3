//! Transaction CLI commands
//!
//! Implements CLI commands for transaction management.

use clap::Subcommand;

use crate::display::transaction::{format_transaction_details, format_transaction_register};
use crate::display::format_amount;
use crate::error::{VaultError, VaultResult};
use crate::models::{NewTransaction, TransactionPatch, TransactionType, TransactionView, UserId};
use crate::services::TransactionService;
use crate::vault::Vault;

use super::{currency, find_account, matches_id, parse_amount, parse_date};

/// Transaction subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Add a new transaction
    Add {
        /// Account name or ID
        account: String,
        /// Amount, always positive (e.g., "250.75")
        amount: String,
        /// Transaction type (income, expense, investment, transfer)
        #[arg(short = 't', long = "type", default_value = "expense")]
        kind: String,
        /// Category
        #[arg(short, long, default_value = "General")]
        category: String,
        /// Destination account for a transfer
        #[arg(long)]
        to: Option<String>,
        /// Transaction date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// List transactions, newest first
    List {
        /// Filter by account name or ID
        #[arg(short, long)]
        account: Option<String>,
        /// Number of transactions to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Show the most recent transactions
    Recent {
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },
    /// Show transaction details
    Show {
        /// Transaction ID
        id: String,
    },
    /// Edit a transaction
    Edit {
        /// Transaction ID
        id: String,
        /// New amount
        #[arg(short, long)]
        amount: Option<String>,
        /// New category
        #[arg(short, long)]
        category: Option<String>,
        /// New date
        #[arg(short, long)]
        date: Option<String>,
        /// New notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Delete a transaction (both legs of a transfer)
    Delete {
        /// Transaction ID
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

fn find_transaction(
    service: &TransactionService<'_>,
    user_id: &UserId,
    id: &str,
) -> VaultResult<TransactionView> {
    service
        .list(user_id)?
        .into_iter()
        .find(|v| {
            let txn_id = &v.transaction.id;
            matches_id(&txn_id.to_string(), &txn_id.key(), id)
        })
        .ok_or_else(|| VaultError::transaction_not_found(id))
}

/// Handle a transaction command
pub fn handle_transaction_command(
    vault: &Vault,
    user_id: &UserId,
    cmd: TransactionCommands,
) -> VaultResult<()> {
    let service = TransactionService::new(vault);
    let currency = currency(vault, user_id);

    match cmd {
        TransactionCommands::Add {
            account,
            amount,
            kind,
            category,
            to,
            date,
            notes,
        } => {
            let account = find_account(vault, user_id, &account)?;
            let transaction_type = TransactionType::parse(&kind).ok_or_else(|| {
                VaultError::Validation(format!(
                    "Invalid transaction type: '{}'. Use income, expense, investment or transfer",
                    kind
                ))
            })?;
            let to_account_id = match to {
                Some(to) => Some(find_account(vault, user_id, &to)?.id),
                None => None,
            };

            let txn = service.create(
                user_id,
                NewTransaction {
                    account_id: account.id,
                    to_account_id,
                    amount: parse_amount(&amount)?,
                    transaction_type,
                    category,
                    notes,
                    date: parse_date(date.as_deref())?,
                },
            )?;

            println!("Created transaction:");
            println!("  ID:       {}", txn.id.key());
            println!("  Date:     {}", txn.date);
            println!("  Type:     {}", txn.transaction_type);
            println!("  Amount:   {}", format_amount(txn.amount, &currency));
            println!("  Category: {}", txn.category);
        }

        TransactionCommands::List { account, limit } => {
            let mut views = service.list(user_id)?;
            if let Some(account) = account {
                let account = find_account(vault, user_id, &account)?;
                views.retain(|v| v.transaction.account_id == account.id);
            }
            views.truncate(limit);

            print!("{}", format_transaction_register(&views, &currency));
            println!("\nShowing {} transactions", views.len());
        }

        TransactionCommands::Recent { limit } => {
            let views = service.recent(user_id, limit)?;
            print!("{}", format_transaction_register(&views, &currency));
        }

        TransactionCommands::Show { id } => {
            let view = find_transaction(&service, user_id, &id)?;
            print!("{}", format_transaction_details(&view, &currency));
        }

        TransactionCommands::Edit {
            id,
            amount,
            category,
            date,
            notes,
        } => {
            let view = find_transaction(&service, user_id, &id)?;
            let patch = TransactionPatch {
                amount: amount.as_deref().map(parse_amount).transpose()?,
                category,
                notes,
                date: date.as_deref().map(|d| parse_date(Some(d))).transpose()?,
                ..Default::default()
            };
            if patch == TransactionPatch::default() {
                println!("No changes specified.");
                return Ok(());
            }

            let updated = service.update(user_id, &view.transaction.id, patch)?;
            println!("Updated transaction: {}", updated.id);
            println!("  Date:   {}", updated.date);
            println!("  Amount: {}", format_amount(updated.amount, &currency));
        }

        TransactionCommands::Delete { id, force } => {
            let view = find_transaction(&service, user_id, &id)?;
            let txn = &view.transaction;

            if !force {
                println!("About to delete transaction:");
                println!("  Date:   {}", txn.date);
                println!("  Amount: {}", format_amount(txn.amount, &currency));
                if txn.transaction_type.is_transfer() {
                    println!("  Both legs of the transfer are deleted.");
                }
                println!();
                println!("Use --force to confirm deletion");
                return Ok(());
            }

            service.delete(user_id, &txn.id)?;
            println!("Deleted transaction: {} ({})", txn.id, txn.date);
        }
    }

    Ok(())
}
