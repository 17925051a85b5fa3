//! Table file I/O
//!
//! Tables are whole-file JSON documents. Writes go to a sibling temp file
//! that is synced and renamed over the original, so a crash leaves either
//! the old table or the new one.
//!
//! Several processes may share a data directory. Each table file has a
//! sidecar `.lock` file; writers hold an exclusive advisory lock on it for
//! the whole read-modify-write and readers hold a shared one while loading.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::VaultError;

/// Read a JSON document, returning the default value if the file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, VaultError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| VaultError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| VaultError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Replace a JSON document atomically (write temp, sync, rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), VaultError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VaultError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = path.with_extension("json.tmp");

    let result = (|| {
        let file = File::create(&temp_path)
            .map_err(|e| VaultError::Storage(format!("Failed to create temp file: {}", e)))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)
            .map_err(|e| VaultError::Storage(format!("Failed to serialize table: {}", e)))?;
        writer
            .flush()
            .map_err(|e| VaultError::Storage(format!("Failed to flush table: {}", e)))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| VaultError::Storage(format!("Failed to sync table: {}", e)))?;

        fs::rename(&temp_path, path)
            .map_err(|e| VaultError::Storage(format!("Failed to rename temp file: {}", e)))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Advisory lock on a table file, released when dropped
pub struct TableLock {
    file: File,
}

impl TableLock {
    /// Block until no other reader or writer holds the table
    pub fn exclusive(table_path: &Path) -> Result<Self, VaultError> {
        let file = open_lock_file(table_path)?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| VaultError::Storage(format!("Failed to lock {}: {}", table_path.display(), e)))?;
        Ok(Self { file })
    }

    /// Block until no writer holds the table
    pub fn shared(table_path: &Path) -> Result<Self, VaultError> {
        let file = open_lock_file(table_path)?;
        FileExt::lock_shared(&file)
            .map_err(|e| VaultError::Storage(format!("Failed to lock {}: {}", table_path.display(), e)))?;
        Ok(Self { file })
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(table_path: &Path) -> PathBuf {
    table_path.with_extension("json.lock")
}

fn open_lock_file(table_path: &Path) -> Result<File, VaultError> {
    let path = lock_path(table_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            VaultError::Storage(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| VaultError::Storage(format!("Failed to open {}: {}", path.display(), e)))
}

/// Identifies one version of a table file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    modified: SystemTime,
    len: u64,
}

/// Stamp of the file at `path`, `None` if it doesn't exist yet
pub fn file_stamp(path: &Path) -> Result<Option<FileStamp>, VaultError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp {
            modified: meta.modified()?,
            len: meta.len(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VaultError::Storage(format!(
            "Failed to stat {}: {}",
            path.display(),
            e
        ))),
    }
}
