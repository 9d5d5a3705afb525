use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{AppVaultError, Result};
use crate::policy::AllowRule;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "APPVAULT_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "APPVAULT_DATA_DIR";

/// Which access policy guards `launch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    /// Ask on the terminal every time.
    #[default]
    Prompt,
    /// Grant only what `allow_list` names.
    AllowList,
    /// Grant everything.
    AllowAll,
}

/// User-level configuration, loaded from `config.toml`.
///
/// Every field has a sensible default so AppVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding `secrets.json` and `audit.db`.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Access policy for launches (default: prompt).
    #[serde(default)]
    pub policy: PolicyMode,

    /// Rules used when `policy = "allow-list"`.
    #[serde(default)]
    pub allow_list: Vec<AllowRule>,

    /// Editor command for `edit`, overriding `$VISUAL` / `$EDITOR`.
    #[serde(default)]
    pub editor: Option<String>,
}

impl Settings {
    /// Name of the config file inside the config directory.
    const FILE_NAME: &'static str = "config.toml";

    /// Load settings from `path`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppVaultError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            AppVaultError::ConfigError(format!("Failed to parse {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), policy = ?settings.policy, "loaded config");
        Ok(settings)
    }

    /// Default config path: `$APPVAULT_CONFIG`, else
    /// `$XDG_CONFIG_HOME/appvault/config.toml`, else
    /// `~/.config/appvault/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = non_empty_env(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let base = match non_empty_env("XDG_CONFIG_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => home_dir()?.join(".config"),
        };
        Ok(base.join("appvault").join(Self::FILE_NAME))
    }

    /// Resolve the data directory.
    ///
    /// Order: `cli_override`, `$APPVAULT_DATA_DIR`, `data_dir` from the
    /// config file, `$XDG_DATA_HOME/appvault`, `~/.local/share/appvault`.
    pub fn data_dir(&self, cli_override: Option<&str>) -> Result<PathBuf> {
        if let Some(dir) = cli_override.filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = self.data_dir.as_deref().filter(|d| !d.is_empty()) {
            return expand_home(dir);
        }
        let base = match non_empty_env("XDG_DATA_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => home_dir()?.join(".local").join("share"),
        };
        Ok(base.join("appvault"))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn home_dir() -> Result<PathBuf> {
    non_empty_env("HOME")
        .or_else(|| non_empty_env("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| {
            AppVaultError::ConfigError(
                "cannot determine home directory — set HOME or APPVAULT_DATA_DIR".into(),
            )
        })
}

/// Expand a leading `~/` in a configured path.
fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(home_dir()?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
