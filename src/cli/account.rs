//! Account CLI commands
//!
//! Implements CLI commands for account management.

use clap::Subcommand;

use crate::display::account::{format_account_details, format_account_list};
use crate::display::format_amount;
use crate::error::{VaultError, VaultResult};
use crate::models::{AccountType, UserId};
use crate::services::AccountService;
use crate::vault::Vault;

use super::{currency, find_account, parse_amount};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account name
        name: String,
        /// Account type (savings, credit_card, cash, wallet)
        #[arg(short = 't', long, default_value = "savings")]
        account_type: String,
        /// Opening balance (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },
    /// List all accounts
    List,
    /// Show account details
    Show {
        /// Account name or ID
        account: String,
    },
    /// Rename an account or change its type
    Rename {
        /// Account name or ID
        account: String,
        /// New name
        name: Option<String>,
        /// New account type
        #[arg(short = 't', long)]
        account_type: Option<String>,
    },
    /// Delete an account with its transactions and recurring rules
    Delete {
        /// Account name or ID
        account: String,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Show one account's balance, or the total across accounts
    Balance {
        /// Account name or ID
        account: Option<String>,
    },
}

fn parse_account_type(value: &str) -> VaultResult<AccountType> {
    AccountType::parse(value).ok_or_else(|| {
        VaultError::Validation(format!(
            "Invalid account type: '{}'. Valid types: savings, credit_card, cash, wallet",
            value
        ))
    })
}

/// Handle an account command
pub fn handle_account_command(vault: &Vault, user_id: &UserId, cmd: AccountCommands) -> VaultResult<()> {
    let service = AccountService::new(vault);
    let currency = currency(vault, user_id);

    match cmd {
        AccountCommands::Create {
            name,
            account_type,
            balance,
        } => {
            let account_type = parse_account_type(&account_type)?;
            let balance = parse_amount(&balance)?;

            let account = service.create(user_id, &name, account_type, balance)?;

            println!("Created account: {}", account.name);
            println!("  Type:    {}", account.account_type);
            println!("  Balance: {}", format_amount(account.balance, &currency));
            println!("  ID:      {}", account.id.key());
        }

        AccountCommands::List => {
            let accounts = service.list(user_id)?;
            print!("{}", format_account_list(&accounts, &currency));
        }

        AccountCommands::Show { account } => {
            let found = find_account(vault, user_id, &account)?;
            print!("{}", format_account_details(&found, &currency));
        }

        AccountCommands::Rename {
            account,
            name,
            account_type,
        } => {
            let found = find_account(vault, user_id, &account)?;
            let account_type = account_type.as_deref().map(parse_account_type).transpose()?;

            if name.is_none() && account_type.is_none() {
                println!("No changes specified. Pass a new name or --account-type.");
                return Ok(());
            }

            let updated = service.update(user_id, &found.id, name.as_deref(), account_type)?;
            println!("Updated account: {}", updated);
        }

        AccountCommands::Delete { account, force } => {
            let found = find_account(vault, user_id, &account)?;

            if !force {
                println!("About to delete account: {}", found);
                println!("  Its transactions and recurring rules are deleted too.");
                println!();
                println!("Use --force to confirm deletion");
                return Ok(());
            }

            service.delete(user_id, &found.id)?;
            println!("Deleted account: {}", found.name);
        }

        AccountCommands::Balance { account } => match account {
            Some(account) => {
                let found = find_account(vault, user_id, &account)?;
                let balance = service.balance(user_id, &found.id)?;
                println!("{}: {}", found.name, format_amount(balance, &currency));
            }
            None => {
                let total = service.total_balance(user_id)?;
                println!("Total: {}", format_amount(total, &currency));
            }
        },
    }

    Ok(())
}
