//! `appvault init`: create or restore the master key.

use dialoguer::Password;

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::crypto::MasterKey;
use crate::errors::{AppVaultError, Result};
use crate::store::format::ensure_parent_dir;

/// Execute the `init` command.
pub fn execute(cli: &Cli, recovery_key: Option<&str>, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let launcher = ctx.launcher();

    // 1. Parse the recovery key before touching the vault.
    let recovery = match recovery_key {
        Some("-") => Some(prompt_recovery_key()?),
        Some(text) => Some(MasterKey::from_hex(text)?),
        None => None,
    };
    let restoring = recovery.is_some();

    // 2. Make sure the data directory exists (the secrets file is created on first edit).
    ensure_parent_dir(launcher.store().path())?;

    // 3. Store the key, replacing an existing or unreadable one only with --force.
    if force {
        output::warning("--force: any existing master key will be replaced.");
    }
    let key = match launcher.init_guarded(recovery, force) {
        Ok(key) => key,
        Err(e @ AppVaultError::AlreadyInitialized) => {
            output::tip("Pass --force to reset the key; existing secrets become unreadable.");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    ctx.audit(
        "init",
        None,
        "ok",
        Some(if restoring { "restored" } else { "generated" }),
    );

    if restoring {
        output::success("Master key restored into the key vault.");
        return Ok(());
    }

    output::success("Master key created and stored in the key vault.");
    output::warning("Save this recovery key in your password manager — it is shown only once:");
    println!("{}", key.to_hex().as_str());
    output::tip("Run `appvault edit <APP>` to add secrets for an application.");
    Ok(())
}

/// Read a recovery key without echoing it.
fn prompt_recovery_key() -> Result<MasterKey> {
    let text = Password::new()
        .with_prompt("Recovery key")
        .interact()
        .map_err(|e| AppVaultError::CommandFailed(format!("recovery key prompt: {e}")))?;
    let text = zeroize::Zeroizing::new(text);
    MasterKey::from_hex(&text)
}
