use appvault::cli::commands;
use appvault::cli::{Cli, Commands};
use appvault::errors::AppVaultError;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            ref recovery_key,
            force,
        } => commands::init::execute(&cli, recovery_key.as_deref(), force),
        Commands::Edit { ref app } => commands::edit::execute(&cli, app),
        Commands::Launch { ref app, ref args } => commands::launch::execute(&cli, app, args),
        Commands::List { ref app } => commands::list::execute(&cli, app.as_deref()),
        Commands::Remove { ref app, force } => commands::remove::execute(&cli, app, force),
        Commands::Audit { last, ref since } => {
            commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
        Commands::Completions { shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        // A failed child carries only its exit code.
        if !matches!(e, AppVaultError::ChildProcessFailed(_)) {
            appvault::cli::output::error(&e.to_string());
        }
        std::process::exit(e.exit_code());
    }
}

/// Diagnostics go to stderr, filtered by `APPVAULT_LOG` (default: warn).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("APPVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
