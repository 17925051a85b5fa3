//! Preference CLI commands

use clap::Subcommand;

use crate::error::VaultResult;
use crate::models::UserId;
use crate::services::PreferenceService;
use crate::vault::Vault;

#[derive(Subcommand)]
pub enum PrefsCommands {
    /// Show saved preferences
    Show,
    /// Set the display currency (three-letter code, e.g. USD)
    SetCurrency { currency: String },
}

pub fn handle_prefs_command(vault: &Vault, user_id: &UserId, cmd: PrefsCommands) -> VaultResult<()> {
    let service = PreferenceService::new(vault);

    match cmd {
        PrefsCommands::Show => {
            let prefs = service.get(user_id);
            println!("Currency: {}", prefs.currency);
            for (key, value) in &prefs.extra {
                println!("{}: {}", key, value);
            }
        }
        PrefsCommands::SetCurrency { currency } => {
            let prefs = service.set_currency(user_id, &currency)?;
            println!("Currency set to {}", prefs.currency);
        }
    }

    Ok(())
}
