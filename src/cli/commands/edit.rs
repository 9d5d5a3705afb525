//! `appvault edit`: edit the secrets of one application.

use crate::cli::output;
use crate::cli::{resolve_app_path, Cli, Context};
use crate::errors::Result;
use crate::launcher::EditResult;

/// Execute the `edit` command.
pub fn execute(cli: &Cli, app: &str) -> Result<()> {
    let ctx = Context::load(cli)?;
    let app_path = resolve_app_path(app)?;

    match ctx.launcher().edit_envs(&app_path)? {
        EditResult::Saved { count } => {
            ctx.audit("edit", Some(&app_path), "saved", Some(&format!("{count} secret(s)")));
            output::success(&format!("Saved {count} secret(s) for {app_path}"));
        }
        EditResult::Cancelled => {
            output::info("Edit cancelled — nothing was saved.");
        }
    }

    Ok(())
}
