//! Loan CLI commands

use clap::Subcommand;

use crate::display::loan::{format_loan_details, format_loan_list};
use crate::error::{VaultError, VaultResult};
use crate::models::{Loan, NewLoan, UserId};
use crate::services::LoanService;
use crate::vault::Vault;

use super::{currency, matches_id, parse_amount, parse_date};

/// Loan subcommands
#[derive(Subcommand)]
pub enum LoanCommands {
    /// Record a loan
    Add {
        /// Loan name
        name: String,
        /// Principal borrowed
        total: String,
        /// Monthly instalment
        emi: String,
        /// Amount still owed, defaults to the principal
        #[arg(short, long)]
        outstanding: Option<String>,
        /// First instalment date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        start: Option<String>,
        /// Loan term in months
        #[arg(short, long, default_value = "12")]
        months: u32,
    },
    /// List loans
    List,
    /// Record a payment against a loan
    Pay {
        /// Loan name or ID
        loan: String,
        /// Amount paid
        amount: String,
    },
    /// Delete a loan
    Delete {
        /// Loan name or ID
        loan: String,
    },
}

fn find_loan(service: &LoanService<'_>, user_id: &UserId, identifier: &str) -> VaultResult<Loan> {
    let wanted = identifier.trim().to_lowercase();
    service
        .list(user_id)?
        .into_iter()
        .find(|l| {
            l.name.to_lowercase() == wanted || matches_id(&l.id.to_string(), &l.id.key(), identifier)
        })
        .ok_or_else(|| VaultError::loan_not_found(identifier))
}

/// Handle a loan command
pub fn handle_loan_command(vault: &Vault, user_id: &UserId, cmd: LoanCommands) -> VaultResult<()> {
    let service = LoanService::new(vault);
    let currency = currency(vault, user_id);

    match cmd {
        LoanCommands::Add {
            name,
            total,
            emi,
            outstanding,
            start,
            months,
        } => {
            let loan = service.create(
                user_id,
                NewLoan {
                    name,
                    total_amount: parse_amount(&total)?,
                    outstanding_balance: outstanding.as_deref().map(parse_amount).transpose()?,
                    emi_amount: parse_amount(&emi)?,
                    start_date: parse_date(start.as_deref())?,
                    duration_months: months,
                },
            )?;
            println!("Created loan:");
            print!("{}", format_loan_details(&loan, &currency));
        }

        LoanCommands::List => {
            let loans = service.list(user_id)?;
            print!("{}", format_loan_list(&loans, &currency));
        }

        LoanCommands::Pay { loan, amount } => {
            let found = find_loan(&service, user_id, &loan)?;
            let updated = service.record_payment(user_id, &found.id, parse_amount(&amount)?)?;
            println!("Recorded payment on {}", updated.name);
            print!("{}", format_loan_details(&updated, &currency));
        }

        LoanCommands::Delete { loan } => {
            let found = find_loan(&service, user_id, &loan)?;
            service.delete(user_id, &found.id)?;
            println!("Deleted loan: {}", found.name);
        }
    }

    Ok(())
}
