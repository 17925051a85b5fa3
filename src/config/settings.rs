//! Settings for finvault
//!
//! Tunables for the key cache, the balance update retry budget and the
//! fallback currency. Every field has a default so a partial or missing
//! `config.json` still loads.

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::error::VaultError;

/// Key cache tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCacheSettings {
    /// Maximum number of user keys held in memory
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Seconds a cached key stays valid before it is fetched again
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for KeyCacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// Balance read-modify-write tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSettings {
    /// Attempts made when the stored row version moves underneath an update
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for BalanceSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// finvault settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub key_cache: KeyCacheSettings,

    #[serde(default)]
    pub balance: BalanceSettings,

    /// Currency reported when a user has no readable preferences
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Whether mutations are appended to `audit.log`
    #[serde(default = "default_audit_enabled")]
    pub audit_enabled: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_cache_ttl() -> u64 {
    900
}

fn default_max_retries() -> u32 {
    3
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            key_cache: KeyCacheSettings::default(),
            balance: BalanceSettings::default(),
            default_currency: default_currency(),
            audit_enabled: default_audit_enabled(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &VaultPaths) -> Result<Self, VaultError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| VaultError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| VaultError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> Result<(), VaultError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| VaultError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
