use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use finvault::cli::{
    handle_account_command, handle_dashboard_command, handle_loan_command, handle_prefs_command,
    handle_recurring_command, handle_transaction_command, handle_user_command, AccountCommands,
    LoanCommands, PrefsCommands, RecurringCommands, TransactionCommands, UserCommands,
};
use finvault::config::{Settings, VaultPaths};
use finvault::logging::{self, LogFormat};
use finvault::models::UserId;
use finvault::services::UserService;
use finvault::vault::Vault;

#[derive(Parser)]
#[command(
    name = "finvault",
    version,
    about = "Personal finance tracker with per-user encryption at rest",
    long_about = "finvault keeps accounts, transactions, loans and recurring payments \
                  in local JSON tables. Names, amounts, balances and notes are \
                  encrypted with a key that belongs to each user."
)]
struct Cli {
    /// User whose records to work with
    #[arg(long, global = true, env = "FINVAULT_USER")]
    user: Option<String>,

    /// Log output format (filter with FINVAULT_LOG)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Transaction management commands
    #[command(subcommand, alias = "txn")]
    Transaction(TransactionCommands),

    /// Loan management commands
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Recurring transaction commands
    #[command(subcommand)]
    Recurring(RecurringCommands),

    /// Preference commands
    #[command(subcommand)]
    Prefs(PrefsCommands),

    /// Show balances, this month's income and spending, and debt
    Dashboard {
        /// Report on the month containing this date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,

        /// Also show per-category spending for this many months
        #[arg(short, long)]
        months: Option<u32>,
    },

    /// User lifecycle commands
    #[command(subcommand)]
    User(UserCommands),

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    let paths = VaultPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    let Some(command) = cli.command else {
        println!("finvault - encrypted personal finance tracker");
        println!();
        println!("Run 'finvault --help' for usage information.");
        return Ok(());
    };

    if let Commands::Config = command {
        println!("finvault Configuration");
        println!("======================");
        println!("Base directory:  {}", paths.base_dir().display());
        println!("Data directory:  {}", paths.data_dir().display());
        println!("Settings file:   {}", paths.settings_file().display());
        println!("Audit log:       {}", paths.audit_log().display());
        println!();
        println!("Settings:");
        println!("  Key cache capacity:  {}", settings.key_cache.capacity);
        println!("  Key cache TTL:       {}s", settings.key_cache.ttl_secs);
        println!("  Balance retries:     {}", settings.balance.max_retries);
        println!("  Default currency:    {}", settings.default_currency);
        println!("  Audit enabled:       {}", settings.audit_enabled);
        return Ok(());
    }

    let vault = Vault::open(paths, settings)?;
    let user = cli.user.as_deref().map(str::trim).filter(|u| !u.is_empty()).map(UserId::from);
    let require_user = || {
        user.clone()
            .context("No user given. Pass --user <id> or set FINVAULT_USER")
    };

    // Every per-user command starts by making sure the user has a key,
    // the way signing in does.
    let signed_in = |user_id: &UserId| -> Result<()> {
        UserService::new(&vault).ensure_key(user_id)?;
        Ok(())
    };

    match command {
        Commands::Account(cmd) => {
            let user_id = require_user()?;
            signed_in(&user_id)?;
            handle_account_command(&vault, &user_id, cmd)?;
        }
        Commands::Transaction(cmd) => {
            let user_id = require_user()?;
            signed_in(&user_id)?;
            handle_transaction_command(&vault, &user_id, cmd)?;
        }
        Commands::Loan(cmd) => {
            let user_id = require_user()?;
            signed_in(&user_id)?;
            handle_loan_command(&vault, &user_id, cmd)?;
        }
        Commands::Recurring(cmd) => {
            if let Some(user_id) = &user {
                signed_in(user_id)?;
            }
            handle_recurring_command(&vault, user.as_ref(), cmd)?;
        }
        Commands::Prefs(cmd) => {
            let user_id = require_user()?;
            signed_in(&user_id)?;
            handle_prefs_command(&vault, &user_id, cmd)?;
        }
        Commands::Dashboard { date, months } => {
            let user_id = require_user()?;
            signed_in(&user_id)?;
            handle_dashboard_command(&vault, &user_id, date.as_deref(), months)?;
        }
        Commands::User(cmd) => {
            let user_id = require_user()?;
            handle_user_command(&vault, &user_id, cmd)?;
        }
        Commands::Config => {}
    }

    Ok(())
}
