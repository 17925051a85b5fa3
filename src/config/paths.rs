//! Path management for finvault
//!
//! ## Path Resolution Order
//!
//! 1. `FINVAULT_DATA_DIR` environment variable (if set)
//! 2. The platform data directory from `directories` (e.g. `~/.local/share/finvault`)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::VaultError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "FINVAULT_DATA_DIR";

/// Manages all paths used by finvault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    /// Base directory for all finvault data
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Create a new VaultPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if no platform data directory can be determined and
    /// `FINVAULT_DATA_DIR` is unset.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = match std::env::var(DATA_DIR_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => ProjectDirs::from("", "", "finvault")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    VaultError::Config(format!(
                        "Could not determine a data directory, set {}",
                        DATA_DIR_ENV
                    ))
                })?,
        };

        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Directory holding one JSON file per table
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Get the path backing a storage table, e.g. `data/transactions.json`
    pub fn table_file(&self, table: &str) -> PathBuf {
        self.data_dir().join(format!("{}.json", table))
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| VaultError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }
}
