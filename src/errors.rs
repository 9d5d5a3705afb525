use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in AppVault.
#[derive(Debug, Error)]
pub enum AppVaultError {
    // --- Launch gate errors ---
    #[error("No secrets configured for '{0}' — run `appvault edit {0}` first")]
    UnknownApplication(String),

    #[error("Permission denied — launch of '{0}' with secrets was not approved")]
    PermissionDenied(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong master key or corrupted secret data")]
    DecryptionFailed,

    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    // --- Key vault errors ---
    #[error("Key vault unavailable: {0} — run `appvault init` to (re)create the master key")]
    VaultUnavailable(String),

    #[error("No master key found — run `appvault init` first")]
    NotInitialized,

    #[error("A master key already exists — re-initializing makes every stored secret unreadable (use --force to reset anyway)")]
    AlreadyInitialized,

    // --- Store errors ---
    #[error("Cannot access secrets file {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Secrets file {path} is corrupted: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Refusing to load {path}: permissions {mode:o} allow access by other users (run `chmod 600` on it)")]
    InsecurePermissions { path: PathBuf, mode: u32 },

    #[error("Invalid secret name '{0}': {1}")]
    InvalidSecretName(String, String),

    #[error("Invalid value for secret '{0}': values cannot contain NUL bytes")]
    InvalidSecretValue(String),

    // --- Collaborator errors ---
    #[error("Editor error: {0}")]
    EditorError(String),

    #[error("Access policy error: {0}")]
    PolicyError(String),

    #[error("Failed to launch '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process exited with code {0}")]
    ChildProcessFailed(i32),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- Misc ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit error: {0}")]
    AuditError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl AppVaultError {
    /// Process exit code the CLI should use for this error.
    ///
    /// A failed child keeps its own code so `appvault launch` is
    /// transparent to scripts.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChildProcessFailed(code) => *code,
            _ => 1,
        }
    }
}

/// Convenience type alias for AppVault results.
pub type Result<T> = std::result::Result<T, AppVaultError>;
