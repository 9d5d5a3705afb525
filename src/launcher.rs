//! The launcher: ties the store, key vault, access policy, editor and
//! process spawner together.
//!
//! A launch walks these stages in order and stops at the first failure:
//!
//! ```text
//! configured? -> policy check -> key retrieved -> decrypted -> spawned
//! ```
//!
//! The key vault is only touched after the policy has said yes.  The
//! master key is fetched per call and dropped (zeroized) before the
//! call returns; it is never cached on the `Launcher`.

use std::ffi::OsString;
use std::fmt;

use crate::crypto::MasterKey;
use crate::editor::{EditOutcome, SecretEditor};
use crate::errors::{AppVaultError, Result};
use crate::keyring::KeyVault;
use crate::policy::{AccessPolicy, AccessRequest, CallerContext};
use crate::process::{merge_environment, ExecResult, Spawner};
use crate::store::secrets::wipe;
use crate::store::{LockMode, SecretStore};

/// Stages of a single launch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    Unconfigured,
    PermissionPending,
    KeyRetrieved,
    Decrypted,
    Spawned,
}

impl fmt::Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::PermissionPending => "permission-pending",
            Self::KeyRetrieved => "key-retrieved",
            Self::Decrypted => "decrypted",
            Self::Spawned => "spawned",
        };
        f.write_str(name)
    }
}

/// What `edit_envs` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditResult {
    /// The application now has exactly `count` secrets.
    Saved { count: usize },
    /// The editor was cancelled; nothing was written.
    Cancelled,
}

/// Orchestrates every user-facing operation.
pub struct Launcher {
    store: SecretStore,
    vault: Box<dyn KeyVault>,
    policy: Box<dyn AccessPolicy>,
    editor: Box<dyn SecretEditor>,
    spawner: Box<dyn Spawner>,
    /// Parent environment override; `None` means this process's.
    parent_env: Option<Vec<(OsString, OsString)>>,
}

impl Launcher {
    pub fn new(
        store: SecretStore,
        vault: Box<dyn KeyVault>,
        policy: Box<dyn AccessPolicy>,
        editor: Box<dyn SecretEditor>,
        spawner: Box<dyn Spawner>,
    ) -> Self {
        Self {
            store,
            vault,
            policy,
            editor,
            spawner,
            parent_env: None,
        }
    }

    /// Use `env` instead of the current process environment as the
    /// base for launched children.
    pub fn with_parent_env(mut self, env: Vec<(OsString, OsString)>) -> Self {
        self.parent_env = Some(env);
        self
    }

    pub fn store(&self) -> &SecretStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Key lifecycle
    // ------------------------------------------------------------------

    /// Create (or adopt `recovery` as) the master key and store it in
    /// the key vault, replacing any previous key.
    pub fn init(&self, recovery: Option<MasterKey>) -> Result<MasterKey> {
        self.store.init(self.vault.as_ref(), recovery)
    }

    /// `init` with a guard against replacing an existing key.
    ///
    /// Without `force` an existing key is `AlreadyInitialized` and a
    /// vault that cannot be read is returned as its error.  With
    /// `force` both are replaced, so an unreadable key can always be
    /// recovered from.
    pub fn init_guarded(&self, recovery: Option<MasterKey>, force: bool) -> Result<MasterKey> {
        match self.has_master_key() {
            Ok(false) => {}
            Ok(true) if force => {
                tracing::warn!("replacing existing master key");
            }
            Ok(true) => return Err(AppVaultError::AlreadyInitialized),
            Err(e) if force => {
                tracing::warn!(error = %e, "replacing unreadable master key");
            }
            Err(e) => return Err(e),
        }
        self.init(recovery)
    }

    /// Whether the key vault currently holds a master key.
    ///
    /// Vault failures other than "no key" are returned as errors so a
    /// caller guarding re-initialization fails closed.
    pub fn has_master_key(&self) -> Result<bool> {
        match self.vault.retrieve() {
            Ok(_) => Ok(true),
            Err(AppVaultError::NotInitialized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn list_applications(&self) -> Result<Vec<String>> {
        let _lock = self.store.lock(LockMode::Shared)?;
        self.store.list_applications()
    }

    pub fn list_env_keys(&self, app_path: &str) -> Result<Vec<String>> {
        let _lock = self.store.lock(LockMode::Shared)?;
        self.store.available_keys(app_path)
    }

    /// Forget `app_path`.  Returns whether it was configured.
    pub fn remove(&self, app_path: &str) -> Result<bool> {
        let _lock = self.store.lock(LockMode::Exclusive)?;
        self.store.remove(app_path)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Let the user edit the secrets of `app_path`.
    ///
    /// The store stays exclusively locked from the read until the
    /// write, so a concurrent edit of another application cannot be
    /// lost.  On cancellation no write happens at all.
    pub fn edit_envs(&self, app_path: &str) -> Result<EditResult> {
        let _lock = self.store.lock(LockMode::Exclusive)?;

        let key = self.vault.retrieve()?;
        let mut current = self.store.get(app_path, &key)?;

        let outcome = self.editor.edit(app_path, &current);
        wipe(&mut current);

        match outcome? {
            EditOutcome::Cancelled => {
                tracing::info!(app = app_path, "edit cancelled, store untouched");
                Ok(EditResult::Cancelled)
            }
            EditOutcome::Updated(mut updated) => {
                let saved = self.store.set(app_path, &updated, &key);
                let count = updated.len();
                wipe(&mut updated);
                saved?;
                Ok(EditResult::Saved { count })
            }
        }
    }

    // ------------------------------------------------------------------
    // Launching
    // ------------------------------------------------------------------

    /// Launch `app_path` with its secrets injected, if the policy allows.
    pub fn launch(
        &self,
        app_path: &str,
        args: &[String],
        caller: &CallerContext,
    ) -> Result<ExecResult> {
        let env = {
            let _lock = self.store.lock(LockMode::Shared)?;

            stage(app_path, LaunchStage::Unconfigured);
            if !self.store.app_configured(app_path)? {
                tracing::warn!(app = app_path, %caller, "launch of unconfigured application");
                return Err(AppVaultError::UnknownApplication(app_path.to_string()));
            }

            let names = self.store.available_keys(app_path)?;

            stage(app_path, LaunchStage::PermissionPending);
            let request = AccessRequest {
                app_path,
                args,
                secret_names: &names,
                caller,
            };
            if !self.policy.check(&request)? {
                tracing::warn!(app = app_path, %caller, "launch denied by access policy");
                return Err(AppVaultError::PermissionDenied(app_path.to_string()));
            }
            tracing::info!(app = app_path, %caller, secrets = names.len(), "launch granted");

            let key = self.vault.retrieve()?;
            stage(app_path, LaunchStage::KeyRetrieved);

            let mut secrets = self.store.get(app_path, &key)?;
            drop(key);
            stage(app_path, LaunchStage::Decrypted);

            let parent = match &self.parent_env {
                Some(env) => env.clone(),
                None => std::env::vars_os().collect(),
            };
            let env = merge_environment(parent, &secrets);
            wipe(&mut secrets);
            env
        };

        let result = self.spawner.spawn(app_path, args, &env)?;
        stage(app_path, LaunchStage::Spawned);
        Ok(result)
    }
}

fn stage(app_path: &str, stage: LaunchStage) {
    tracing::debug!(app = app_path, %stage, "launch stage");
}
