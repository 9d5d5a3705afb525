//! The master key and its text encoding.
//!
//! All secrets for all applications are encrypted under one 256-bit
//! master key.  It lives in the key vault; in process memory it only
//! ever exists inside a `MasterKey`, which wipes itself on drop.

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{AppVaultError, Result};

/// Length of the master key (256 bits).
pub const KEY_LEN: usize = 32;

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        let key = Self::new(bytes);
        bytes.zeroize();
        key
    }

    /// Build a key from a byte slice, as returned by a key vault.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|_| {
            AppVaultError::InvalidMasterKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self::new(bytes))
    }

    /// Parse a recovery key printed by `appvault init` (64 hex chars).
    ///
    /// The error message never echoes the input.
    pub fn from_hex(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.len() != KEY_LEN * 2 {
            return Err(AppVaultError::InvalidMasterKey(format!(
                "expected {} hex characters, got {}",
                KEY_LEN * 2,
                trimmed.len()
            )));
        }

        let mut raw = hex::decode(trimmed).map_err(|_| {
            AppVaultError::InvalidMasterKey("recovery key must be hexadecimal".into())
        })?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }

    /// Lowercase hex form, suitable for backing up in a password manager.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.bytes))
    }

    /// Access the raw key bytes (e.g. to pass to encryption).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = MasterKey::generate();
        let b = MasterKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn hex_roundtrip() {
        let key = MasterKey::new([0xAB; KEY_LEN]);
        let text = key.to_hex();
        assert_eq!(text.len(), 64);
        let parsed = MasterKey::from_hex(&text).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn hex_accepts_whitespace_and_uppercase() {
        let text = format!("  {}\n", "AB".repeat(KEY_LEN));
        let parsed = MasterKey::from_hex(&text).unwrap();
        assert_eq!(parsed.as_bytes(), &[0xAB; KEY_LEN]);
    }

    #[test]
    fn hex_rejects_wrong_length() {
        let result = MasterKey::from_hex("abcd");
        assert!(matches!(result, Err(AppVaultError::InvalidMasterKey(_))));
    }

    #[test]
    fn hex_error_does_not_echo_input() {
        let bogus = "zz".repeat(KEY_LEN);
        let err = MasterKey::from_hex(&bogus).unwrap_err();
        assert!(!err.to_string().contains(&bogus));
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(MasterKey::from_slice(&[0u8; 31]).is_err());
        assert!(MasterKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn debug_hides_bytes() {
        let key = MasterKey::new([0x42; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "MasterKey(..)");
    }
}
