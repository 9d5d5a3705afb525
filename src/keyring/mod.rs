//! Key vault: where the master key lives.
//!
//! The master key is never written to disk by AppVault.  It is kept in
//! a `KeyVault`, of which there are three:
//! - `OsKeyring`: the operating system's credential store (macOS
//!   Keychain, Windows Credential Manager, Linux Secret Service).
//!   Compiled with the `keyring-store` feature.
//! - `EnvKeyVault`: read-only, takes the hex key from an environment
//!   variable (CI, headless machines).
//! - `MemoryKeyVault`: in-process, for tests and embedding.

use std::cell::RefCell;

use zeroize::Zeroizing;

use crate::crypto::MasterKey;
use crate::errors::{AppVaultError, Result};

/// Service name used in the OS keyring.
pub const SERVICE_NAME: &str = "appvault";

/// Account name of the single master-key entry.
pub const ACCOUNT_NAME: &str = "master-key";

/// Environment variable read by `EnvKeyVault`.
pub const MASTER_KEY_ENV: &str = "APPVAULT_MASTER_KEY";

/// Opaque storage for the one master key.
pub trait KeyVault {
    /// Store `key`, replacing any existing one.
    fn store(&self, key: &MasterKey) -> Result<()>;

    /// Fetch the master key.
    ///
    /// Fails with `NotInitialized` if no key has been stored and with
    /// `VaultUnavailable` if the vault itself cannot be used.
    fn retrieve(&self) -> Result<MasterKey>;
}

// ---------------------------------------------------------------------------
// OS keyring
// ---------------------------------------------------------------------------

/// Master key in the OS credential store, saved as hex text.
#[cfg(feature = "keyring-store")]
#[derive(Debug, Clone)]
pub struct OsKeyring {
    service: String,
    account: String,
}

#[cfg(feature = "keyring-store")]
impl OsKeyring {
    pub fn new() -> Self {
        Self::with_names(SERVICE_NAME, ACCOUNT_NAME)
    }

    /// Use a different service/account pair, e.g. one per profile.
    pub fn with_names(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account).map_err(|e| {
            AppVaultError::VaultUnavailable(format!("failed to open keyring entry: {e}"))
        })
    }
}

#[cfg(feature = "keyring-store")]
impl Default for OsKeyring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "keyring-store")]
impl KeyVault for OsKeyring {
    fn store(&self, key: &MasterKey) -> Result<()> {
        let entry = self.entry()?;
        entry.set_password(&key.to_hex()).map_err(|e| {
            AppVaultError::VaultUnavailable(format!("failed to store key in keyring: {e}"))
        })
    }

    fn retrieve(&self) -> Result<MasterKey> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(text) => {
                let text = Zeroizing::new(text);
                MasterKey::from_hex(&text).map_err(|_| {
                    AppVaultError::VaultUnavailable("keyring entry does not hold a valid key".into())
                })
            }
            Err(keyring::Error::NoEntry) => Err(AppVaultError::NotInitialized),
            Err(e) => Err(AppVaultError::VaultUnavailable(format!(
                "failed to read from keyring: {e}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment variable
// ---------------------------------------------------------------------------

/// Read-only vault backed by an environment variable holding the hex key.
#[derive(Debug, Clone)]
pub struct EnvKeyVault {
    var: String,
}

impl EnvKeyVault {
    pub fn new() -> Self {
        Self::with_var(MASTER_KEY_ENV)
    }

    pub fn with_var(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }

    /// Returns `true` if the variable is set and non-empty.
    pub fn is_configured(&self) -> bool {
        std::env::var_os(&self.var).is_some_and(|v| !v.is_empty())
    }
}

impl Default for EnvKeyVault {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyVault for EnvKeyVault {
    fn store(&self, _key: &MasterKey) -> Result<()> {
        Err(AppVaultError::VaultUnavailable(format!(
            "the master key comes from ${} and cannot be replaced — unset it to use the OS keyring",
            self.var
        )))
    }

    fn retrieve(&self) -> Result<MasterKey> {
        match std::env::var(&self.var) {
            Ok(text) if !text.is_empty() => {
                let text = Zeroizing::new(text);
                MasterKey::from_hex(&text).map_err(|e| {
                    AppVaultError::VaultUnavailable(format!("${} is not a valid key: {e}", self.var))
                })
            }
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(AppVaultError::NotInitialized),
            Err(std::env::VarError::NotUnicode(_)) => Err(AppVaultError::VaultUnavailable(
                format!("${} is not valid UTF-8", self.var),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Vault that keeps the key in process memory only.
#[derive(Debug, Default)]
pub struct MemoryKeyVault {
    key: RefCell<Option<MasterKey>>,
}

impl MemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// A vault that already holds `key`.
    pub fn with_key(key: MasterKey) -> Self {
        Self {
            key: RefCell::new(Some(key)),
        }
    }
}

impl KeyVault for MemoryKeyVault {
    fn store(&self, key: &MasterKey) -> Result<()> {
        *self.key.borrow_mut() = Some(key.clone());
        Ok(())
    }

    fn retrieve(&self) -> Result<MasterKey> {
        self.key.borrow().clone().ok_or(AppVaultError::NotInitialized)
    }
}

// ---------------------------------------------------------------------------
// Unavailable
// ---------------------------------------------------------------------------

/// Stand-in used when no key vault backend is available in this build.
#[derive(Debug, Clone)]
pub struct UnavailableVault {
    reason: String,
}

impl UnavailableVault {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl KeyVault for UnavailableVault {
    fn store(&self, _key: &MasterKey) -> Result<()> {
        Err(AppVaultError::VaultUnavailable(self.reason.clone()))
    }

    fn retrieve(&self) -> Result<MasterKey> {
        Err(AppVaultError::VaultUnavailable(self.reason.clone()))
    }
}

/// Pick the key vault for this process.
///
/// 1. `APPVAULT_MASTER_KEY` if set (CI/CD)
/// 2. The OS keyring (if compiled with `keyring-store`)
/// 3. Otherwise a vault that reports why no backend exists
pub fn default_vault() -> Box<dyn KeyVault> {
    let env_vault = EnvKeyVault::new();
    if env_vault.is_configured() {
        tracing::debug!("using master key from environment");
        return Box::new(env_vault);
    }

    #[cfg(feature = "keyring-store")]
    {
        Box::new(OsKeyring::new())
    }

    #[cfg(not(feature = "keyring-store"))]
    {
        Box::new(UnavailableVault::new(
            "keyring support not compiled — rebuild with `--features keyring-store` or set APPVAULT_MASTER_KEY",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_vault_starts_empty() {
        let vault = MemoryKeyVault::new();
        assert!(matches!(vault.retrieve(), Err(AppVaultError::NotInitialized)));
    }

    #[test]
    fn memory_vault_store_and_retrieve() {
        let vault = MemoryKeyVault::new();
        let key = MasterKey::new([3u8; 32]);
        vault.store(&key).unwrap();
        assert_eq!(vault.retrieve().unwrap().as_bytes(), key.as_bytes());
    }

    #[test]
    fn memory_vault_store_overwrites() {
        let vault = MemoryKeyVault::with_key(MasterKey::new([1u8; 32]));
        vault.store(&MasterKey::new([2u8; 32])).unwrap();
        assert_eq!(vault.retrieve().unwrap().as_bytes(), &[2u8; 32]);
    }

    #[test]
    fn env_vault_missing_var_is_not_initialized() {
        let vault = EnvKeyVault::with_var("APPVAULT_TEST_KEY_THAT_IS_NEVER_SET");
        assert!(!vault.is_configured());
        assert!(matches!(vault.retrieve(), Err(AppVaultError::NotInitialized)));
    }

    #[test]
    fn env_vault_is_read_only() {
        let vault = EnvKeyVault::with_var("APPVAULT_TEST_KEY_THAT_IS_NEVER_SET");
        let result = vault.store(&MasterKey::new([0u8; 32]));
        assert!(matches!(result, Err(AppVaultError::VaultUnavailable(_))));
    }

    #[test]
    fn unavailable_vault_reports_reason() {
        let vault = UnavailableVault::new("no backend");
        let err = vault.retrieve().unwrap_err();
        assert!(err.to_string().contains("no backend"));
    }
}
