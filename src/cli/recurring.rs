//! Recurring transaction CLI commands

use clap::Subcommand;

use crate::display::recurring::{format_recurring_list, format_recurring_runs};
use crate::display::format_amount;
use crate::error::{VaultError, VaultResult};
use crate::models::{Frequency, NewRecurring, TransactionType, UserId};
use crate::services::RecurringService;
use crate::vault::Vault;

use super::{currency, find_account, matches_id, parse_amount, parse_date};

/// Recurring subcommands
#[derive(Subcommand)]
pub enum RecurringCommands {
    /// Add a recurring transaction
    Add {
        /// Account name or ID
        account: String,
        /// Amount per occurrence
        amount: String,
        /// Description
        description: String,
        /// Transaction type (income, expense, investment, transfer)
        #[arg(short = 't', long = "type", default_value = "expense")]
        kind: String,
        /// Category
        #[arg(short, long, default_value = "General")]
        category: String,
        /// How often it repeats (monthly, yearly)
        #[arg(short, long, default_value = "monthly")]
        frequency: String,
        /// Start date (YYYY-MM-DD), defaults to today; the first occurrence is one period later
        #[arg(short, long)]
        start: Option<String>,
        /// Destination account for a transfer
        #[arg(long)]
        to: Option<String>,
    },
    /// List recurring transactions, soonest due first
    List,
    /// Delete a recurring transaction
    Delete {
        /// Recurring transaction ID
        id: String,
    },
    /// Post every rule that is due, for all users
    Process {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
    },
}

/// Handle a recurring command
///
/// `process` runs for every user and is the only subcommand that works
/// without a user id.
pub fn handle_recurring_command(
    vault: &Vault,
    user_id: Option<&UserId>,
    cmd: RecurringCommands,
) -> VaultResult<()> {
    let service = RecurringService::new(vault);
    let require_user = || {
        user_id.ok_or_else(|| {
            VaultError::Validation("This command needs --user or FINVAULT_USER".into())
        })
    };

    match cmd {
        RecurringCommands::Add {
            account,
            amount,
            description,
            kind,
            category,
            frequency,
            start,
            to,
        } => {
            let user_id = require_user()?;
            let account = find_account(vault, user_id, &account)?;
            let transaction_type = TransactionType::parse(&kind).ok_or_else(|| {
                VaultError::Validation(format!("Invalid transaction type: '{}'", kind))
            })?;
            let frequency = Frequency::parse(&frequency).ok_or_else(|| {
                VaultError::Validation(format!(
                    "Invalid frequency: '{}'. Use monthly or yearly",
                    frequency
                ))
            })?;
            let to_account_id = match to {
                Some(to) => Some(find_account(vault, user_id, &to)?.id),
                None => None,
            };

            let rule = service.create(
                user_id,
                NewRecurring {
                    account_id: account.id,
                    to_account_id,
                    description,
                    amount: parse_amount(&amount)?,
                    transaction_type,
                    category,
                    frequency,
                    start_date: parse_date(start.as_deref())?,
                },
            )?;

            println!("Created recurring transaction: {}", rule.description);
            println!(
                "  Amount:   {}",
                format_amount(rule.amount, &currency(vault, user_id))
            );
            println!("  Every:    {}", rule.frequency);
            println!("  Next due: {}", rule.next_due_date);
            println!("  ID:       {}", rule.id.key());
        }

        RecurringCommands::List => {
            let user_id = require_user()?;
            let views = service.list(user_id)?;
            print!(
                "{}",
                format_recurring_list(&views, &currency(vault, user_id))
            );
        }

        RecurringCommands::Delete { id } => {
            let user_id = require_user()?;
            let found = service
                .list(user_id)?
                .into_iter()
                .map(|v| v.recurring)
                .find(|r| matches_id(&r.id.to_string(), &r.id.key(), &id))
                .ok_or_else(|| VaultError::recurring_not_found(&id))?;
            service.delete(user_id, &found.id)?;
            println!("Deleted recurring transaction: {}", found.description);
        }

        RecurringCommands::Process { date } => {
            let today = parse_date(date.as_deref())?;
            let runs = service.process_due(today)?;
            print!("{}", format_recurring_runs(&runs));
        }
    }

    Ok(())
}
