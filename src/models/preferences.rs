//! User preferences
//!
//! Stored as one encrypted JSON document per user. Keys other than
//! `currency` are kept as-is so newer clients don't lose their settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Currency used when a user has never saved preferences
pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Preferences {
    pub fn with_currency(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            extra: Map::new(),
        }
    }

    /// Shallow-merge `changes` over these preferences
    pub fn merged(&self, changes: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut doc = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in changes {
            doc.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(doc))
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::with_currency(DEFAULT_CURRENCY)
    }
}
