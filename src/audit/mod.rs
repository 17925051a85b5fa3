//! Audit logging for finvault
//!
//! Records create, update and delete operations in an append-only JSONL log.
//! Only column names are recorded, never the values written to them.
//!
//! # Example
//!
//! ```rust,ignore
//! use finvault::audit::{AuditEntry, AuditLogger, EntityType};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! let entry = AuditEntry::update(EntityType::Account, account.id.key(), &user, vec!["balance".into()]);
//! logger.log(&entry)?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
