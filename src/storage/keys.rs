//! Per-user encryption key store
//!
//! Holds at most one key row per user in `user_encryption_keys.json`. Rows
//! are only reachable by their owner's id; there is no listing operation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::crypto::{generate_key, KeyMaterial};
use crate::error::{VaultError, VaultResult};
use crate::models::UserId;

use super::file_io::{file_stamp, read_json, write_json_atomic, FileStamp, TableLock};

/// Storage seam for user keys
///
/// Implementations must be safe to call from several threads at once and
/// must reject a second `create_user_key` for the same user.
pub trait KeyStore: Send + Sync {
    /// Generate and persist a new key for `user_id`
    ///
    /// Fails with [`VaultError::DuplicateKey`] if one already exists.
    fn create_user_key(&self, user_id: &UserId) -> VaultResult<()>;

    /// Fetch the user's key
    ///
    /// Fails with [`VaultError::KeyNotFound`] if no row exists.
    fn get_user_key(&self, user_id: &UserId) -> VaultResult<KeyMaterial>;

    /// Remove the user's key, returning whether a row existed
    fn delete_user_key(&self, user_id: &UserId) -> VaultResult<bool>;
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredKey {
    user_id: UserId,
    /// base64 of the 32 key bytes
    encryption_key: String,
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        self.encryption_key.zeroize();
    }
}

#[derive(Default, Serialize, Deserialize)]
struct KeyData {
    keys: Vec<StoredKey>,
}

struct KeyState {
    keys: HashMap<UserId, StoredKey>,
    stamp: Option<FileStamp>,
}

/// File-backed [`KeyStore`]
///
/// Like the row tables, it reloads when the file changes underneath it and
/// writes under an exclusive file lock, so processes sharing a data
/// directory never drop each other's keys.
pub struct KeyRepository {
    path: PathBuf,
    state: RwLock<KeyState>,
}

impl KeyRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: RwLock::new(KeyState {
                keys: HashMap::new(),
                stamp: None,
            }),
        }
    }

    fn state_read(&self) -> VaultResult<RwLockReadGuard<'_, KeyState>> {
        self.state
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn state_write(&self) -> VaultResult<RwLockWriteGuard<'_, KeyState>> {
        self.state
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    fn reload_into(&self, state: &mut KeyState) -> VaultResult<()> {
        let file_data: KeyData = read_json(&self.path)?;
        state.keys = file_data
            .keys
            .into_iter()
            .map(|row| (row.user_id.clone(), row))
            .collect();
        state.stamp = file_stamp(&self.path)?;
        Ok(())
    }

    /// Load key rows from disk
    pub fn load(&self) -> VaultResult<()> {
        let _lock = TableLock::shared(&self.path)?;
        let mut state = self.state_write()?;
        self.reload_into(&mut state)
    }

    fn read(&self) -> VaultResult<RwLockReadGuard<'_, KeyState>> {
        let _lock = TableLock::shared(&self.path)?;
        let current = file_stamp(&self.path)?;
        let stale = self.state_read()?.stamp != current;
        if stale {
            let mut state = self.state_write()?;
            self.reload_into(&mut state)?;
        }
        self.state_read()
    }

    fn save_locked(&self, data: &HashMap<UserId, StoredKey>) -> VaultResult<()> {
        let mut keys: Vec<StoredKey> = data.values().cloned().collect();
        keys.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        write_json_atomic(&self.path, &KeyData { keys })
    }

    pub fn exists(&self, user_id: &UserId) -> VaultResult<bool> {
        Ok(self.read()?.keys.contains_key(user_id))
    }

    pub fn count(&self) -> VaultResult<usize> {
        Ok(self.read()?.keys.len())
    }
}

impl KeyStore for KeyRepository {
    fn create_user_key(&self, user_id: &UserId) -> VaultResult<()> {
        let _lock = TableLock::exclusive(&self.path)?;
        let mut state = self.state_write()?;
        self.reload_into(&mut state)?;

        if state.keys.contains_key(user_id) {
            return Err(VaultError::DuplicateKey {
                user_id: user_id.to_string(),
            });
        }

        let key = generate_key();
        state.keys.insert(
            user_id.clone(),
            StoredKey {
                user_id: user_id.clone(),
                encryption_key: key.to_base64(),
            },
        );

        if let Err(e) = self.save_locked(&state.keys) {
            state.keys.remove(user_id);
            return Err(e);
        }
        state.stamp = file_stamp(&self.path)?;

        info!(user_id = %user_id, "created encryption key");
        Ok(())
    }

    fn get_user_key(&self, user_id: &UserId) -> VaultResult<KeyMaterial> {
        let state = self.read()?;

        let row = state.keys.get(user_id).ok_or_else(|| VaultError::KeyNotFound {
            user_id: user_id.to_string(),
        })?;

        debug!(user_id = %user_id, "loaded encryption key");
        KeyMaterial::from_base64(&row.encryption_key).map_err(|e| VaultError::KeyUnavailable {
            user_id: user_id.to_string(),
            reason: e.to_string(),
        })
    }

    fn delete_user_key(&self, user_id: &UserId) -> VaultResult<bool> {
        let _lock = TableLock::exclusive(&self.path)?;
        let mut state = self.state_write()?;
        self.reload_into(&mut state)?;

        let Some(removed) = state.keys.remove(user_id) else {
            return Ok(false);
        };

        if let Err(e) = self.save_locked(&state.keys) {
            state.keys.insert(user_id.clone(), removed);
            return Err(e);
        }
        state.stamp = file_stamp(&self.path)?;

        info!(user_id = %user_id, "deleted encryption key");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, KeyRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = KeyRepository::new(temp_dir.path().join("user_encryption_keys.json"));
        (temp_dir, repo)
    }

    #[test]
    fn test_create_and_get() {
        let (_temp, repo) = create_test_repo();
        let user = UserId::from("u1");

        repo.create_user_key(&user).unwrap();
        let a = repo.get_user_key(&user).unwrap();
        let b = repo.get_user_key(&user).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_missing_key() {
        let (_temp, repo) = create_test_repo();
        let err = repo.get_user_key(&UserId::from("nobody")).unwrap_err();
        assert!(matches!(err, VaultError::KeyNotFound { .. }));
    }

    #[test]
    fn test_duplicate_rejected() {
        let (_temp, repo) = create_test_repo();
        let user = UserId::from("u1");
        repo.create_user_key(&user).unwrap();

        let err = repo.create_user_key(&user).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateKey { .. }));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_users_get_distinct_keys() {
        let (_temp, repo) = create_test_repo();
        let (a, b) = (UserId::from("a"), UserId::from("b"));
        repo.create_user_key(&a).unwrap();
        repo.create_user_key(&b).unwrap();

        assert_ne!(
            repo.get_user_key(&a).unwrap().as_bytes(),
            repo.get_user_key(&b).unwrap().as_bytes()
        );
    }

    #[test]
    fn test_persists_across_reload() {
        let (temp, repo) = create_test_repo();
        let user = UserId::from("u1");
        repo.create_user_key(&user).unwrap();
        let original = repo.get_user_key(&user).unwrap();

        let reopened = KeyRepository::new(temp.path().join("user_encryption_keys.json"));
        reopened.load().unwrap();
        assert_eq!(
            reopened.get_user_key(&user).unwrap().as_bytes(),
            original.as_bytes()
        );
    }

    #[test]
    fn test_delete() {
        let (_temp, repo) = create_test_repo();
        let user = UserId::from("u1");
        repo.create_user_key(&user).unwrap();

        assert!(repo.delete_user_key(&user).unwrap());
        assert!(!repo.delete_user_key(&user).unwrap());
        assert!(!repo.exists(&user).unwrap());
    }

    #[test]
    fn test_corrupt_row_is_unavailable() {
        let (temp, _repo) = create_test_repo();
        let path = temp.path().join("user_encryption_keys.json");
        std::fs::write(
            &path,
            r#"{"keys":[{"user_id":"u1","encryption_key":"dG9vIHNob3J0"}]}"#,
        )
        .unwrap();

        let repo = KeyRepository::new(path);
        repo.load().unwrap();
        let err = repo.get_user_key(&UserId::from("u1")).unwrap_err();
        assert!(matches!(err, VaultError::KeyUnavailable { .. }));
    }

    #[test]
    fn test_repositories_sharing_a_file_keep_both_keys() {
        let (temp, first) = create_test_repo();
        let second = KeyRepository::new(temp.path().join("user_encryption_keys.json"));
        first.load().unwrap();
        second.load().unwrap();
        let (a, b) = (UserId::from("a"), UserId::from("b"));

        first.create_user_key(&a).unwrap();
        second.create_user_key(&b).unwrap();

        let err = second.create_user_key(&a).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateKey { .. }));
        assert_eq!(
            second.get_user_key(&a).unwrap().as_bytes(),
            first.get_user_key(&a).unwrap().as_bytes()
        );

        let reopened = KeyRepository::new(temp.path().join("user_encryption_keys.json"));
        reopened.load().unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
    }
}
