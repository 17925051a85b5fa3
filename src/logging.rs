//! Tracing subscriber setup for the finvault binary.
//!
//! Logs go to stderr so command output on stdout stays clean. The filter is
//! read from `FINVAULT_LOG` and defaults to `warn`. Nothing in the crate logs
//! plaintext field values or key material; user and row ids are fine.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::error::{VaultError, VaultResult};

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "FINVAULT_LOG";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Initialise the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber has already been set.
pub fn init(format: LogFormat) -> VaultResult<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| VaultError::Config(format!("failed to initialise tracing subscriber: {e}")))
}
