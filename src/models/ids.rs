//! Strongly-typed ID wrappers for all entity types
//!
//! Row ids are UUIDs stored in their hyphenated form. User ids are opaque
//! strings handed to us by whatever authenticates the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate ID newtype wrappers
macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// The value stored in the `id` column of a table row
            pub fn key(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, &self.0.to_string()[..8])
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix($display_prefix).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(AccountId, "acc-");
define_id!(TransactionId, "txn-");
define_id!(LoanId, "loan-");
define_id!(RecurringId, "rec-");

/// Identifier of the user who owns a row and its encryption key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display_is_short() {
        let id = AccountId::new();
        let display = id.to_string();
        assert!(display.starts_with("acc-"));
        assert_eq!(display.len(), 12);
    }

    #[test]
    fn test_key_is_full_uuid() {
        let id = LoanId::new();
        assert_eq!(id.key(), id.as_uuid().to_string());
        assert_eq!(id.key().parse::<LoanId>().unwrap(), id);
    }

    #[test]
    fn test_parse_with_prefix() {
        let id = TransactionId::new();
        let prefixed = format!("txn-{}", id.key());
        assert_eq!(prefixed.parse::<TransactionId>().unwrap(), id);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = RecurringId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.key()));
    }

    #[test]
    fn test_user_id_roundtrips_as_plain_string() {
        let user = UserId::from("auth0|abc");
        assert_eq!(serde_json::to_string(&user).unwrap(), "\"auth0|abc\"");
        assert_eq!(user.to_string(), "auth0|abc");
    }
}
