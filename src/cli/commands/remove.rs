//! `appvault remove`: forget an application and its secrets.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{resolve_app_path, Cli, Context};
use crate::errors::{AppVaultError, Result};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, app: &str, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let app_path = resolve_app_path(app)?;

    // Unless --force is set, ask for confirmation before removing.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove {app_path} and all its secrets?"))
            .default(false)
            .interact()
            .map_err(|e| AppVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    if ctx.launcher().remove(&app_path)? {
        ctx.audit("remove", Some(&app_path), "ok", None);
        output::success(&format!("Removed configuration for {app_path}"));
    } else {
        output::info(&format!("{app_path} was not configured."));
    }

    Ok(())
}
