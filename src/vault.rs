//! Wiring for a finvault data directory
//!
//! [`Vault`] owns the storage tables, the key-resolving crypto provider and
//! the record cipher built on them. Services borrow it.

use std::sync::Arc;

use tracing::info;

use crate::config::{Settings, VaultPaths};
use crate::crypto::CryptoProvider;
use crate::error::VaultResult;
use crate::records::RecordCipher;
use crate::storage::{KeyStore, Storage};

pub struct Vault {
    storage: Storage,
    crypto: Arc<CryptoProvider>,
    records: RecordCipher,
    settings: Settings,
}

impl Vault {
    /// Open (creating if needed) the data directory and load every table
    pub fn open(paths: VaultPaths, settings: Settings) -> VaultResult<Self> {
        let storage = Storage::new(paths, settings.audit_enabled)?;
        storage.load_all()?;

        let keys: Arc<dyn KeyStore> = storage.keys.clone();
        let crypto = Arc::new(CryptoProvider::from_settings(keys, &settings.key_cache));
        let records = RecordCipher::new(
            Arc::clone(&crypto),
            Arc::clone(&storage.accounts),
            settings.balance.max_retries,
        );

        info!(base_dir = %storage.paths().base_dir().display(), "opened vault");

        Ok(Self {
            storage,
            crypto,
            records,
            settings,
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn crypto(&self) -> &CryptoProvider {
        &self.crypto
    }

    pub fn records(&self) -> &RecordCipher {
        &self.records
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// A vault in a fresh temp directory
    pub fn test_vault() -> (TempDir, Vault) {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let vault = Vault::open(paths, Settings::default()).unwrap();
        (temp_dir, vault)
    }
}
