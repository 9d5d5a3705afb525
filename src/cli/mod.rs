//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::config::{PolicyMode, Settings};
use crate::editor::ExternalEditor;
use crate::errors::{AppVaultError, Result};
use crate::launcher::Launcher;
use crate::policy::{AccessPolicy, AllowAllPolicy, AllowListPolicy, PromptPolicy};
use crate::process::CommandSpawner;
use crate::store::SecretStore;

/// AppVault CLI: launch applications with their encrypted secrets.
#[derive(Parser)]
#[command(
    name = "appvault",
    about = "Launch applications with per-app encrypted secrets behind a permission check",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding secrets.json (default: ~/.local/share/appvault)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Config file (default: ~/.config/appvault/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create the master key (prints it once for backup)
    Init {
        /// Restore this hex recovery key instead of generating one ("-" to prompt)
        recovery_key: Option<String>,

        /// Replace an existing master key (makes stored secrets unreadable)
        #[arg(long)]
        force: bool,
    },

    /// Edit the secrets of an application in your editor
    Edit {
        /// Path to the application
        app: String,
    },

    /// Launch an application with its secrets injected
    Launch {
        /// Path to the application
        app: String,

        /// Arguments for the application (after --)
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// List configured applications, or the secret names of one
    List {
        /// Show the secret names configured for this application
        app: Option<String>,
    },

    /// Remove an application and all its secrets
    Remove {
        /// Path to the application
        app: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// View the audit log of launches and edits
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolved settings and paths for one CLI invocation.
pub struct Context {
    pub settings: Settings,
    pub data_dir: PathBuf,
}

impl Context {
    /// Load the config file and resolve the data directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => PathBuf::from(path),
            None => Settings::default_path()?,
        };
        let settings = Settings::load(&config_path)?;
        let data_dir = settings.data_dir(cli.data_dir.as_deref())?;
        tracing::debug!(data_dir = %data_dir.display(), "resolved data directory");
        Ok(Self { settings, data_dir })
    }

    pub fn store(&self) -> SecretStore {
        SecretStore::in_dir(&self.data_dir)
    }

    /// Build a launcher wired to the real key vault, policy, editor and
    /// process spawner.
    pub fn launcher(&self) -> Launcher {
        Launcher::new(
            self.store(),
            crate::keyring::default_vault(),
            policy_for(&self.settings),
            Box::new(ExternalEditor::from_env(self.settings.editor.as_deref())),
            Box::new(CommandSpawner),
        )
    }

    /// Record an audit event; never fails.
    pub fn audit(&self, op: &str, app: Option<&str>, outcome: &str, details: Option<&str>) {
        crate::audit::log_audit(&self.data_dir, op, app, outcome, details);
    }
}

/// The access policy selected in the settings.
pub fn policy_for(settings: &Settings) -> Box<dyn AccessPolicy> {
    match settings.policy {
        PolicyMode::Prompt => Box::new(PromptPolicy),
        PolicyMode::AllowList => Box::new(AllowListPolicy::new(settings.allow_list.clone())),
        PolicyMode::AllowAll => Box::new(AllowAllPolicy),
    }
}

/// Make an application path from the command line absolute.
///
/// Purely lexical against the current directory: symlinks are not
/// resolved and the path does not need to exist.
pub fn resolve_app_path(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(AppVaultError::CommandFailed(
            "application path cannot be empty".into(),
        ));
    }
    let absolute = std::path::absolute(raw)?;
    absolute
        .into_os_string()
        .into_string()
        .map_err(|_| AppVaultError::CommandFailed(format!("application path '{raw}' is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(resolve_app_path("/usr/bin/env").unwrap(), "/usr/bin/env");
    }

    #[test]
    fn relative_paths_become_absolute() {
        let resolved = resolve_app_path("bin/tool").unwrap();
        assert!(std::path::Path::new(&resolved).is_absolute());
        assert!(resolved.ends_with("bin/tool"));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(resolve_app_path("  ").is_err());
    }

    #[test]
    fn policy_selection_follows_settings() {
        use crate::policy::{AccessRequest, CallerContext};

        let settings = Settings {
            policy: PolicyMode::AllowAll,
            ..Settings::default()
        };
        let caller = CallerContext::new("test", 1);
        let request = AccessRequest {
            app_path: "/bin/app",
            args: &[],
            secret_names: &[],
            caller: &caller,
        };
        assert!(policy_for(&settings).check(&request).unwrap());

        let settings = Settings {
            policy: PolicyMode::AllowList,
            ..Settings::default()
        };
        assert!(!policy_for(&settings).check(&request).unwrap());
    }

    #[test]
    fn launch_args_after_double_dash() {
        let cli = Cli::try_parse_from(["appvault", "launch", "/bin/app", "--", "-v", "--flag"]).unwrap();
        match cli.command {
            Commands::Launch { app, args } => {
                assert_eq!(app, "/bin/app");
                assert_eq!(args, vec!["-v".to_string(), "--flag".to_string()]);
            }
            _ => panic!("expected launch"),
        }
    }

    #[test]
    fn completions_take_a_known_shell() {
        let cli = Cli::try_parse_from(["appvault", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions {
                shell: clap_complete::Shell::Zsh
            }
        ));
        assert!(Cli::try_parse_from(["appvault", "completions", "csh"]).is_err());
    }
}
