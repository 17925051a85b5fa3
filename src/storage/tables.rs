//! Row tables for JSON storage
//!
//! A [`Table`] holds untyped rows (`serde_json` objects) keyed by one column
//! and scoped by `user_id`. Rows carry their stored representation, so the
//! sensitive columns in them are ciphertext. Every write bumps the row's
//! `version` column and is persisted before the call returns. Several
//! processes can share one table file safely.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use tracing::debug;

use crate::error::{VaultError, VaultResult};
use crate::models::UserId;

use super::file_io::{file_stamp, read_json, write_json_atomic, FileStamp, TableLock};

/// A stored row
pub type Row = Map<String, Value>;

/// Columns owned by the table and never overwritten by an update patch
const MANAGED_COLUMNS: &[&str] = &["id", "user_id", "version", "created_at"];

/// Read the `version` column of a row (0 if missing)
pub fn row_version(row: &Row) -> u64 {
    row.get("version").and_then(Value::as_u64).unwrap_or(0)
}

/// Read the `user_id` column of a row
pub fn row_owner(row: &Row) -> Option<UserId> {
    row.get("user_id")
        .and_then(Value::as_str)
        .map(UserId::from)
}

/// Result of a version-checked update
#[derive(Debug)]
pub enum CasOutcome {
    /// The row matched the expected version and was written
    Updated(Row),
    /// The row moved on since it was read
    Stale { current: u64 },
    /// No such row for this user
    Missing,
}

#[derive(Default, Serialize, Deserialize)]
struct TableData {
    rows: Vec<Row>,
}

/// Describes how a table keys and stamps its rows
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    /// Column holding the primary key
    pub key_column: &'static str,
    /// Whether inserts stamp a `created_at` column
    pub timestamps: bool,
}

impl TableSpec {
    pub const fn with_id(name: &'static str) -> Self {
        Self {
            name,
            key_column: "id",
            timestamps: true,
        }
    }
}

struct TableState {
    rows: HashMap<String, Row>,
    /// Stamp of the file the rows were last read from or written to
    stamp: Option<FileStamp>,
}

/// A persisted table of rows
///
/// The in-memory rows are a cache of the file. Reads reload them when the
/// file has changed since it was last seen, and every write reloads them
/// under the table's exclusive lock before applying its change, so a
/// version check also sees writes made by other processes.
pub struct Table {
    spec: TableSpec,
    path: PathBuf,
    state: RwLock<TableState>,
}

impl Table {
    pub fn new(spec: TableSpec, path: PathBuf) -> Self {
        Self {
            spec,
            path,
            state: RwLock::new(TableState {
                rows: HashMap::new(),
                stamp: None,
            }),
        }
    }

    fn state_read(&self) -> VaultResult<RwLockReadGuard<'_, TableState>> {
        self.state
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn state_write(&self) -> VaultResult<RwLockWriteGuard<'_, TableState>> {
        self.state
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    fn reload_into(&self, state: &mut TableState) -> VaultResult<()> {
        let file_data: TableData = read_json(&self.path)?;

        let mut rows = HashMap::with_capacity(file_data.rows.len());
        for row in file_data.rows {
            let Some(key) = row.get(self.spec.key_column).and_then(Value::as_str) else {
                return Err(VaultError::Storage(format!(
                    "Row in {} has no {} column",
                    self.spec.name, self.spec.key_column
                )));
            };
            rows.insert(key.to_string(), row);
        }

        state.rows = rows;
        state.stamp = file_stamp(&self.path)?;
        Ok(())
    }

    /// Load rows from disk
    pub fn load(&self) -> VaultResult<()> {
        let _lock = TableLock::shared(&self.path)?;
        let mut state = self.state_write()?;
        self.reload_into(&mut state)
    }

    /// Current rows, reloaded first if another writer replaced the file
    fn read(&self) -> VaultResult<RwLockReadGuard<'_, TableState>> {
        let _lock = TableLock::shared(&self.path)?;
        let current = file_stamp(&self.path)?;
        let stale = self.state_read()?.stamp != current;
        if stale {
            debug!(table = self.spec.name, "table changed on disk, reloading");
            let mut state = self.state_write()?;
            self.reload_into(&mut state)?;
        }
        self.state_read()
    }

    fn persist(&self, data: &HashMap<String, Row>) -> VaultResult<()> {
        let mut rows: Vec<Row> = data.values().cloned().collect();
        rows.sort_by(|a, b| {
            let key = |r: &Row| {
                r.get(self.spec.key_column)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            key(a).cmp(&key(b))
        });
        write_json_atomic(&self.path, &TableData { rows })
    }

    /// Run a mutation against the rows on disk and persist it
    ///
    /// The exclusive file lock is held from the reload through the write.
    /// The closure returns its result and whether it changed anything;
    /// memory is rolled back if it fails or the write does.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Row>) -> VaultResult<(T, bool)>,
    ) -> VaultResult<T> {
        let _lock = TableLock::exclusive(&self.path)?;
        let mut state = self.state_write()?;
        self.reload_into(&mut state)?;

        let snapshot = state.rows.clone();
        let (out, changed) = match f(&mut state.rows) {
            Ok(result) => result,
            Err(e) => {
                state.rows = snapshot;
                return Err(e);
            }
        };
        if !changed {
            return Ok(out);
        }

        if let Err(e) = self.persist(&state.rows) {
            state.rows = snapshot;
            return Err(e);
        }
        state.stamp = file_stamp(&self.path)?;
        Ok(out)
    }

    /// Insert a row owned by `user_id`
    ///
    /// Assigns `id` when the table is keyed by id and the row has none, and
    /// stamps `user_id`, `version` and (if enabled) `created_at`.
    pub fn insert(&self, user_id: &UserId, mut row: Row) -> VaultResult<Row> {
        row.insert("user_id".into(), Value::String(user_id.to_string()));
        if self.spec.key_column == "id" && !row.contains_key("id") {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if self.spec.timestamps && !row.contains_key("created_at") {
            row.insert("created_at".into(), serde_json::to_value(Utc::now())?);
        }
        row.insert("version".into(), Value::from(1u64));

        let key = row
            .get(self.spec.key_column)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                VaultError::Storage(format!(
                    "Row for {} has no {} column",
                    self.spec.name, self.spec.key_column
                ))
            })?;

        self.mutate(|data| {
            if data.contains_key(&key) {
                return Err(VaultError::Storage(format!(
                    "Duplicate key {} in {}",
                    key, self.spec.name
                )));
            }
            data.insert(key, row.clone());
            Ok((row, true))
        })
    }

    /// Get a row by key, only if it belongs to `user_id`
    pub fn get(&self, key: &str, user_id: &UserId) -> VaultResult<Option<Row>> {
        let state = self.read()?;
        Ok(state
            .rows
            .get(key)
            .filter(|row| owned_by(row, user_id))
            .cloned())
    }

    /// All rows owned by `user_id`
    pub fn list(&self, user_id: &UserId) -> VaultResult<Vec<Row>> {
        let state = self.read()?;
        Ok(state
            .rows
            .values()
            .filter(|row| owned_by(row, user_id))
            .cloned()
            .collect())
    }

    /// Every row regardless of owner (scheduled jobs only)
    pub fn list_all(&self) -> VaultResult<Vec<Row>> {
        let state = self.read()?;
        Ok(state.rows.values().cloned().collect())
    }

    /// Merge `patch` into a row and bump its version
    pub fn update(&self, key: &str, user_id: &UserId, patch: Row) -> VaultResult<Option<Row>> {
        self.mutate(|data| {
            let Some(row) = data.get_mut(key).filter(|row| owned_by(row, user_id)) else {
                return Ok((None, false));
            };
            apply_patch(row, patch);
            Ok((Some(row.clone()), true))
        })
    }

    /// Merge `patch` only if the row on disk is still at `expected_version`
    pub fn update_if_version(
        &self,
        key: &str,
        user_id: &UserId,
        patch: Row,
        expected_version: u64,
    ) -> VaultResult<CasOutcome> {
        self.mutate(|data| {
            let Some(row) = data.get_mut(key).filter(|row| owned_by(row, user_id)) else {
                return Ok((CasOutcome::Missing, false));
            };

            let current = row_version(row);
            if current != expected_version {
                return Ok((CasOutcome::Stale { current }, false));
            }

            apply_patch(row, patch);
            Ok((CasOutcome::Updated(row.clone()), true))
        })
    }

    /// Delete a row, returning whether it existed
    pub fn delete(&self, key: &str, user_id: &UserId) -> VaultResult<bool> {
        self.mutate(|data| {
            if !data.get(key).is_some_and(|row| owned_by(row, user_id)) {
                return Ok((false, false));
            }
            data.remove(key);
            Ok((true, true))
        })
    }

    /// Delete every row owned by `user_id`, returning how many went
    pub fn delete_owned_by(&self, user_id: &UserId) -> VaultResult<usize> {
        self.mutate(|data| {
            let before = data.len();
            data.retain(|_, row| !owned_by(row, user_id));
            let removed = before - data.len();
            Ok((removed, removed > 0))
        })
    }

    pub fn count(&self) -> VaultResult<usize> {
        Ok(self.read()?.rows.len())
    }
}

fn owned_by(row: &Row, user_id: &UserId) -> bool {
    row.get("user_id").and_then(Value::as_str) == Some(user_id.as_str())
}

fn apply_patch(row: &mut Row, patch: Row) {
    for (column, value) in patch {
        if !MANAGED_COLUMNS.contains(&column.as_str()) {
            row.insert(column, value);
        }
    }
    let next = row_version(row) + 1;
    row.insert("version".into(), Value::from(next));
}
