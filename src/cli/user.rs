//! User lifecycle CLI commands

use clap::Subcommand;

use crate::error::VaultResult;
use crate::models::UserId;
use crate::services::UserService;
use crate::vault::Vault;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Permanently delete all of this user's data and their encryption key
    Erase {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show recent changes to this user's records (column names only)
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

pub fn handle_user_command(vault: &Vault, user_id: &UserId, cmd: UserCommands) -> VaultResult<()> {
    match cmd {
        UserCommands::Erase { force } => {
            if !force {
                println!("About to erase every record for user {}.", user_id);
                println!("Without the key, any copies of the data can no longer be read.");
                println!();
                println!("Use --force to confirm");
                return Ok(());
            }

            let report = UserService::new(vault).erase(user_id)?;
            println!("Erased user {}", user_id);
            println!("  Accounts:      {}", report.accounts);
            println!("  Transactions:  {}", report.transactions);
            println!("  Loans:         {}", report.loans);
            println!("  Recurring:     {}", report.recurring);
            println!("  Preferences:   {}", report.preferences);
            println!(
                "  Key deleted:   {}",
                if report.key_deleted { "Yes" } else { "No" }
            );
        }
        UserCommands::History { limit } => {
            let entries = UserService::new(vault).history(user_id, limit)?;
            if entries.is_empty() {
                println!("No history recorded.");
            }
            for entry in entries {
                let fields = if entry.fields.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", entry.fields.join(", "))
                };
                println!(
                    "{}  {:<6} {} {}{}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.operation,
                    entry.entity_type,
                    entry.entity_id,
                    fields
                );
            }
        }
    }

    Ok(())
}
