//! Cryptographic layer for finvault
//!
//! Each user has one random AES-256 key. Sensitive columns are sealed with
//! AES-256-GCM under that key and stored as base64 text.

pub mod cipher;
pub mod key_cache;
pub mod key_material;
pub mod provider;

pub use key_cache::KeyCache;
pub use key_material::{KeyMaterial, KEY_SIZE};
pub use provider::{format_number, parse_number, CryptoProvider};

/// Generate fresh key material for a new user
pub fn generate_key() -> KeyMaterial {
    KeyMaterial::generate()
}
