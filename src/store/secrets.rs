//! Per-application secret storage used by the launcher.
//!
//! `SecretStore` wraps the JSON format layer and the crypto layer so
//! the launcher can work with plaintext maps like
//! `store.set("/usr/bin/deploy", &envs, &key)`.
//!
//! Every operation re-reads the file, and every write rewrites the
//! whole structure.  Callers that need consistency across several
//! calls hold a `StoreLock` (see `SecretStore::lock`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::crypto::{decrypt_value, encrypt_value, MasterKey};
use crate::errors::{AppVaultError, Result};
use crate::keyring::KeyVault;

use super::format::{self, EncryptedEnvs, StoreData};
use super::lock::{LockMode, StoreLock};

/// Maximum length of a secret (environment variable) name.
const MAX_NAME_LEN: usize = 256;

/// File name of the secrets file inside the data directory.
pub const STORE_FILE_NAME: &str = "secrets.json";

/// Handle to the encrypted secrets file.
#[derive(Debug, Clone)]
pub struct SecretStore {
    path: PathBuf,
}

impl SecretStore {
    /// A store backed by the file at `path`.  Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at `<data_dir>/secrets.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORE_FILE_NAME))
    }

    /// Path to the secrets file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the advisory lock on this store.
    pub fn lock(&self, mode: LockMode) -> Result<StoreLock> {
        StoreLock::acquire(&self.path, mode)
    }

    // ------------------------------------------------------------------
    // Key lifecycle
    // ------------------------------------------------------------------

    /// Put a master key into `vault` and return it.
    ///
    /// With `recovery` the given key is adopted, otherwise a fresh one
    /// is generated.  Any previous key is overwritten, which makes
    /// every existing ciphertext unreadable.  The secrets file is not
    /// touched.
    pub fn init(&self, vault: &dyn KeyVault, recovery: Option<MasterKey>) -> Result<MasterKey> {
        let adopted = recovery.is_some();
        let key = recovery.unwrap_or_else(MasterKey::generate);
        vault.store(&key)?;
        tracing::info!(adopted, "stored master key");
        Ok(key)
    }

    // ------------------------------------------------------------------
    // Metadata (no decryption)
    // ------------------------------------------------------------------

    /// Load the whole persisted structure.
    pub fn load(&self) -> Result<StoreData> {
        format::read_store(&self.path)
    }

    /// Every configured application path, sorted.
    pub fn list_applications(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Secret names configured for `app_path`, sorted.  Empty if the
    /// application is not configured.
    pub fn available_keys(&self, app_path: &str) -> Result<Vec<String>> {
        Ok(self
            .load()?
            .remove(app_path)
            .map(|envs| envs.into_keys().collect())
            .unwrap_or_default())
    }

    /// Returns `true` if `app_path` has an entry, even an empty one.
    pub fn app_configured(&self, app_path: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(app_path))
    }

    /// Delete the entry for `app_path`.
    ///
    /// Returns whether an entry existed.  Nothing is written when it
    /// did not.
    pub fn remove(&self, app_path: &str) -> Result<bool> {
        let mut data = self.load()?;
        if data.remove(app_path).is_none() {
            return Ok(false);
        }
        format::write_store(&self.path, &data)?;
        tracing::info!(app = app_path, "removed application");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Secret values
    // ------------------------------------------------------------------

    /// Decrypt every secret for `app_path`.
    ///
    /// Fails closed: if any single value cannot be decrypted the whole
    /// call fails and the values decrypted so far are wiped.
    pub fn get(&self, app_path: &str, key: &MasterKey) -> Result<HashMap<String, String>> {
        let data = self.load()?;
        let Some(envs) = data.get(app_path) else {
            return Ok(HashMap::new());
        };

        let mut plain = HashMap::with_capacity(envs.len());
        for (name, token) in envs {
            match decrypt_value(key.as_bytes(), token) {
                Ok(value) => {
                    plain.insert(name.clone(), value);
                }
                Err(e) => {
                    tracing::warn!(app = app_path, secret = %name, "secret failed to decrypt");
                    wipe(&mut plain);
                    return Err(e);
                }
            }
        }
        Ok(plain)
    }

    /// Replace the secrets of `app_path` with `secrets`.
    ///
    /// Every value is encrypted under `key`; the application's previous
    /// entry is dropped entirely, not merged.  An empty map leaves the
    /// application configured with no secrets.
    pub fn set(
        &self,
        app_path: &str,
        secrets: &HashMap<String, String>,
        key: &MasterKey,
    ) -> Result<()> {
        for (name, value) in secrets {
            validate_secret_name(name)?;
            if value.contains('\0') {
                return Err(AppVaultError::InvalidSecretValue(name.clone()));
            }
        }

        let mut encrypted = EncryptedEnvs::new();
        for (name, value) in secrets {
            encrypted.insert(name.clone(), encrypt_value(key.as_bytes(), value)?);
        }

        let mut data = self.load()?;
        data.insert(app_path.to_string(), encrypted);
        format::write_store(&self.path, &data)?;

        tracing::info!(app = app_path, secrets = secrets.len(), "saved secrets");
        Ok(())
    }
}

/// Validate that a secret name can be used as an environment variable
/// and written back unchanged as a `KEY=VALUE` editor line.
///
/// Must be non-empty, at most 256 characters, free of `=` and control
/// characters, without surrounding whitespace, and must not start with
/// `#` or `export `.
pub fn validate_secret_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(AppVaultError::InvalidSecretName(
            name.to_string(),
            reason.to_string(),
        ))
    };

    if name.is_empty() {
        return invalid("name cannot be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("name cannot exceed 256 characters");
    }
    if name.contains('=') {
        return invalid("name cannot contain '='");
    }
    if name.contains('\0') {
        return invalid("name cannot contain NUL bytes");
    }
    if name.chars().any(char::is_control) {
        return invalid("name cannot contain control characters");
    }
    if name.trim() != name {
        return invalid("name cannot start or end with whitespace");
    }
    if name.starts_with('#') {
        return invalid("name cannot start with '#'");
    }
    if name.starts_with("export ") {
        return invalid("name cannot start with 'export '");
    }
    Ok(())
}

/// Zero every plaintext value in `map`.
pub(crate) fn wipe(map: &mut HashMap<String, String>) {
    for value in map.values_mut() {
        value.zeroize();
    }
    map.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_secret_names() {
        assert!(validate_secret_name("API_TOKEN").is_ok());
        assert!(validate_secret_name("lower.case-name").is_ok());
        assert!(validate_secret_name(&"A".repeat(256)).is_ok());
    }

    #[test]
    fn rejects_bad_secret_names() {
        assert!(validate_secret_name("").is_err());
        assert!(validate_secret_name("A=B").is_err());
        assert!(validate_secret_name("A\0B").is_err());
        assert!(validate_secret_name(&"A".repeat(257)).is_err());
    }

    #[test]
    fn rejects_names_the_editor_buffer_would_change() {
        for name in [" LEAD", "TRAIL ", "#COMMENT", "export NAME", "A\nB", "A\tB", "A\rB"] {
            assert!(
                matches!(validate_secret_name(name), Err(AppVaultError::InvalidSecretName(..))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn accepted_names_survive_an_editor_roundtrip() {
        use crate::editor::{outcome_from_text, render_buffer, EditOutcome};

        let names = ["API_TOKEN", "with space", "has#hash", "exported", "export", "quote\"d", "ümlaut"];
        let secrets: HashMap<String, String> = names
            .iter()
            .map(|n| {
                validate_secret_name(n).unwrap();
                (n.to_string(), format!("value of {n}"))
            })
            .collect();

        let buffer = render_buffer("/bin/app", &secrets);
        assert_eq!(outcome_from_text(&buffer), EditOutcome::Updated(secrets));
    }

    #[test]
    fn wipe_clears_map() {
        let mut map = HashMap::new();
        map.insert("K".to_string(), "v".to_string());
        wipe(&mut map);
        assert!(map.is_empty());
    }
}
