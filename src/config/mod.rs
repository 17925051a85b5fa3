//! Configuration module for finvault
//!
//! This module provides:
//! - Data directory resolution
//! - Settings persistence

pub mod paths;
pub mod settings;

pub use paths::VaultPaths;
pub use settings::{BalanceSettings, KeyCacheSettings, Settings};
