//! `appvault list`: show configured applications or one app's secret names.

use crate::cli::output;
use crate::cli::{resolve_app_path, Cli, Context};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli, app: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let launcher = ctx.launcher();

    if let Some(app) = app {
        let app_path = resolve_app_path(app)?;
        let keys = launcher.list_env_keys(&app_path)?;
        if keys.is_empty() {
            output::info(&format!("No secrets configured for {app_path}"));
        }
        for key in keys {
            println!("{key}");
        }
        return Ok(());
    }

    let mut rows = Vec::new();
    for app_path in launcher.list_applications()? {
        let count = launcher.list_env_keys(&app_path)?.len();
        rows.push((app_path, count));
    }
    output::print_applications_table(&rows);

    Ok(())
}
