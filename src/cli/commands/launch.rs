//! `appvault launch`: run an application with its secrets injected.

use crate::cli::{resolve_app_path, Cli, Context};
use crate::errors::{AppVaultError, Result};
use crate::policy::CallerContext;

/// Execute the `launch` command.
///
/// The child's exit code becomes ours via `ChildProcessFailed`.
pub fn execute(cli: &Cli, app: &str, args: &[String]) -> Result<()> {
    let ctx = Context::load(cli)?;
    let app_path = resolve_app_path(app)?;
    let caller = CallerContext::parent_process();

    let result = ctx.launcher().launch(&app_path, args, &caller);

    let caller_text = caller.to_string();
    match &result {
        Ok(exec) => {
            let details = match exec.exit_code {
                Some(code) => format!("{caller_text}, exit code {code}"),
                None => format!("{caller_text}, killed by signal"),
            };
            ctx.audit("launch", Some(&app_path), "launched", Some(&details));
        }
        Err(AppVaultError::UnknownApplication(_)) => {
            ctx.audit("launch", Some(&app_path), "unknown", Some(&caller_text));
        }
        Err(AppVaultError::PermissionDenied(_)) => {
            ctx.audit("launch", Some(&app_path), "denied", Some(&caller_text));
        }
        Err(e) => {
            ctx.audit("launch", Some(&app_path), "failed", Some(&e.to_string()));
        }
    }

    let exec = result?;
    match exec.exit_code {
        Some(0) => Ok(()),
        Some(code) => Err(AppVaultError::ChildProcessFailed(code)),
        None => Err(AppVaultError::CommandFailed(
            "child process terminated by signal".into(),
        )),
    }
}
