//! Audit entry data structures
//!
//! Entries name the columns an operation touched. They never carry values:
//! most columns are ciphertext at rest and the log itself is not encrypted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// Types of entities that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Account,
    Transaction,
    Loan,
    RecurringTransaction,
    UserPreferences,
    EncryptionKey,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Account => write!(f, "Account"),
            EntityType::Transaction => write!(f, "Transaction"),
            EntityType::Loan => write!(f, "Loan"),
            EntityType::RecurringTransaction => write!(f, "RecurringTransaction"),
            EntityType::UserPreferences => write!(f, "UserPreferences"),
            EntityType::EncryptionKey => write!(f, "EncryptionKey"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    pub entity_type: EntityType,

    /// ID of the affected entity
    pub entity_id: String,

    /// Owner of the affected entity
    pub user_id: UserId,

    /// Names of the columns written, empty for deletes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl AuditEntry {
    fn new(
        operation: Operation,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        user_id: &UserId,
        fields: Vec<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type,
            entity_id: entity_id.into(),
            user_id: user_id.clone(),
            fields,
        }
    }

    /// Create a new audit entry for a create operation
    pub fn create(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        user_id: &UserId,
        fields: Vec<String>,
    ) -> Self {
        Self::new(Operation::Create, entity_type, entity_id, user_id, fields)
    }

    /// Create a new audit entry for an update operation
    pub fn update(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        user_id: &UserId,
        fields: Vec<String>,
    ) -> Self {
        Self::new(Operation::Update, entity_type, entity_id, user_id, fields)
    }

    /// Create a new audit entry for a delete operation
    pub fn delete(entity_type: EntityType, entity_id: impl Into<String>, user_id: &UserId) -> Self {
        Self::new(Operation::Delete, entity_type, entity_id, user_id, Vec::new())
    }

    /// One-line rendering for `finvault` output
    pub fn format_human_readable(&self) -> String {
        let mut line = format!(
            "[{}] {} {} {} (user {})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.entity_type,
            self.entity_id,
            self.user_id
        );
        if !self.fields.is_empty() {
            line.push_str(&format!(" fields: {}", self.fields.join(", ")));
        }
        line
    }
}
