//! Store module: encrypted per-application secret storage.
//!
//! This module provides:
//! - The JSON secrets file format with atomic, owner-only writes (`format`)
//! - Advisory locking against concurrent writers (`lock`)
//! - High-level `SecretStore` with per-application CRUD (`secrets`)

pub mod format;
pub mod lock;
pub mod secrets;

// Re-export the most commonly used items.
pub use format::{EncryptedEnvs, StoreData};
pub use lock::{LockMode, StoreLock};
pub use secrets::{validate_secret_name, SecretStore, STORE_FILE_NAME};
