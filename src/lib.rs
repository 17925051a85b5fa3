//! finvault - personal finance tracker with per-user field encryption
//!
//! Every user gets their own AES-256-GCM key. Sensitive columns (account
//! names and balances, transaction amounts and notes, loan figures, ...) are
//! encrypted before they reach storage and decrypted on the way out, so the
//! on-disk tables never hold them in the clear.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path resolution and settings
//! - `error`: Custom error types
//! - `logging`: Tracing subscriber setup
//! - `models`: Decrypted data models and their patch types
//! - `storage`: JSON table storage and the key store
//! - `crypto`: Key material, the AES-GCM cipher, key cache and key resolution
//! - `codec`: Which columns of which entity are sensitive, and how they are typed
//! - `records`: Typed record encryption and encrypted balance updates
//! - `vault`: Wiring of storage, crypto and records for one data directory
//! - `services`: Business logic layer
//! - `audit`: Audit logging system
//! - `cli`, `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use finvault::config::{Settings, VaultPaths};
//! use finvault::models::{AccountType, UserId};
//! use finvault::services::AccountService;
//! use finvault::vault::Vault;
//!
//! let paths = VaultPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let vault = Vault::open(paths, settings)?;
//!
//! let user = UserId::from("alice");
//! AccountService::new(&vault).create(&user, "Savings", AccountType::Savings, 1000.0)?;
//! ```

pub mod audit;
pub mod cli;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod logging;
pub mod models;
pub mod records;
pub mod services;
pub mod storage;
pub mod vault;

pub use error::{VaultError, VaultResult};
