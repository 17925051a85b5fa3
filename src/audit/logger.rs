//! Append-only audit logger
//!
//! Each entry is written as a single JSON line and flushed immediately.
//! Writers inside one process are serialized so lines never interleave.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{VaultError, VaultResult};

use super::entry::AuditEntry;

/// Handles writing audit entries to the audit log file (JSONL)
pub struct AuditLogger {
    log_path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Create a new AuditLogger that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an audit entry
    pub fn log(&self, entry: &AuditEntry) -> VaultResult<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| VaultError::Json(format!("Failed to serialize audit entry: {}", e)))?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire audit lock: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| VaultError::Io(format!("Failed to write audit entry: {}", e)))?;

        file.flush()
            .map_err(|e| VaultError::Io(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Read all audit entries, oldest first
    pub fn read_all(&self) -> VaultResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                VaultError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                VaultError::Json(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }
}
