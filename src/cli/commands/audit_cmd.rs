//! `appvault audit`: display the audit log.
//!
//! Usage:
//!   appvault audit               # show last 50 entries
//!   appvault audit --last 20     # show last 20
//!   appvault audit --since 7d    # entries from last 7 days

use chrono::Utc;

use crate::audit::{self, AuditEntry};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{AppVaultError, Result};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;

    let since_dt = match since {
        Some(s) => Some(parse_duration(s)?),
        None => None,
    };

    let entries = audit::read_entries(&ctx.data_dir, last, since_dt)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    Ok(())
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();

    let (num_str, duration): (&str, fn(i64) -> chrono::Duration) =
        if let Some(s) = input.strip_suffix('d') {
            (s, chrono::Duration::days)
        } else if let Some(s) = input.strip_suffix('h') {
            (s, chrono::Duration::hours)
        } else if let Some(s) = input.strip_suffix('m') {
            (s, chrono::Duration::minutes)
        } else {
            return Err(AppVaultError::CommandFailed(format!(
                "invalid duration '{input}' — use format like 7d, 24h, or 30m"
            )));
        };

    let num: i64 = num_str.parse().map_err(|_| {
        AppVaultError::CommandFailed(format!(
            "invalid duration '{input}' — number part is not valid"
        ))
    })?;

    Ok(Utc::now() - duration(num))
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Application", "Outcome", "Details"]);

    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let app = entry.app_path.as_deref().unwrap_or("-");
        let details = entry.details.as_deref().unwrap_or("-");

        table.add_row(vec![
            time,
            entry.operation.clone(),
            app.to_string(),
            colorize_outcome(&entry.outcome),
            details.to_string(),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize outcomes so denials stand out.
fn colorize_outcome(outcome: &str) -> String {
    use console::style;

    match outcome {
        "launched" | "saved" | "ok" => style(outcome).green().to_string(),
        "denied" | "failed" => style(outcome).red().to_string(),
        "unknown" => style(outcome).yellow().to_string(),
        _ => outcome.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_days() {
        let dt = parse_duration("7d").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_days() - 7).abs() <= 1);
    }

    #[test]
    fn parse_duration_hours() {
        let dt = parse_duration("24h").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_hours() - 24).abs() <= 1);
    }

    #[test]
    fn parse_duration_minutes() {
        let dt = parse_duration(" 30m ").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_minutes() - 30).abs() <= 1);
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("7x").is_err());
        assert!(parse_duration("d").is_err());
    }

    #[test]
    fn colorize_outcome_keeps_text() {
        assert!(colorize_outcome("denied").contains("denied"));
        assert_eq!(colorize_outcome("other"), "other");
    }

    #[cfg(feature = "audit-log")]
    #[test]
    fn since_filter_includes_recent_entries() {
        let dir = tempfile::TempDir::new().unwrap();
        audit::log_audit(dir.path(), "launch", Some("/bin/app"), "denied", None);

        let since = parse_duration("1h").unwrap();
        let entries = audit::read_entries(dir.path(), 10, Some(since)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, "denied");
    }
}
