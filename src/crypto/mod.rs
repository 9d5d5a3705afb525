//! Cryptographic primitives for AppVault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - The zeroizing `MasterKey` wrapper and recovery-key encoding (`keys`)

pub mod encryption;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt_value, decrypt_value, MasterKey};
pub use encryption::{decrypt, decrypt_value, encrypt, encrypt_value};
pub use keys::{MasterKey, KEY_LEN};
