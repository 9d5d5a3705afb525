//! Audit log: SQLite-based operation history.
//!
//! Stores a record of every launcher operation (init, edit, remove,
//! launch and its outcome) in a local SQLite database at
//! `<data_dir>/audit.db`.  Secret values are never recorded.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations silently continue without logging.

use std::path::Path;
#[cfg(feature = "audit-log")]
use std::path::PathBuf;

use chrono::{DateTime, Utc};

#[cfg(feature = "audit-log")]
use rusqlite::Connection;

use crate::errors::Result;
#[cfg(feature = "audit-log")]
use crate::errors::AppVaultError;

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub app_path: Option<String>,
    pub outcome: String,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
#[cfg(feature = "audit-log")]
pub struct AuditLog {
    conn: Connection,
}

#[cfg(feature = "audit-log")]
impl AuditLog {
    /// Open (or create) the audit database at `<data_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened; callers should
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(data_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(data_dir);
        let conn = Connection::open(&db_path).ok()?;

        // Set restrictive permissions on the audit database (owner-only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                app_path    TEXT,
                outcome     TEXT NOT NULL,
                details     TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation. Fire-and-forget: errors are silently ignored.
    pub fn log(&self, operation: &str, app_path: Option<&str>, outcome: &str, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, app_path, outcome, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![now, operation, app_path, outcome, details],
        );
    }

    /// Query recent audit entries.
    ///
    /// - `limit`: maximum number of entries to return (most recent first).
    /// - `since`: if provided, only return entries newer than this timestamp.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let since_text = since.map(|ts| ts.to_rfc3339());

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, app_path, outcome, details
                 FROM audit_log
                 WHERE ?1 IS NULL OR timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| AppVaultError::AuditError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since_text, limit_i64], |row| {
                let ts_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    app_path: row.get(3)?,
                    outcome: row.get(4)?,
                    details: row.get(5)?,
                })
            })
            .map_err(|e| AppVaultError::AuditError(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| AppVaultError::AuditError(format!("row parse: {e}")))?);
        }

        Ok(entries)
    }

    /// Return the path to the audit database.
    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("audit.db")
    }
}

/// Convenience helper: log an event into `<data_dir>/audit.db`.
///
/// Silently does nothing when the data directory does not exist yet,
/// the database can't be opened, or audit support is not compiled in.
/// This is safe to call from any command; it never fails the parent
/// operation.
pub fn log_audit(
    data_dir: &Path,
    operation: &str,
    app_path: Option<&str>,
    outcome: &str,
    details: Option<&str>,
) {
    #[cfg(feature = "audit-log")]
    {
        if !data_dir.is_dir() {
            return;
        }
        if let Some(audit) = AuditLog::open(data_dir) {
            audit.log(operation, app_path, outcome, details);
        }
    }

    #[cfg(not(feature = "audit-log"))]
    {
        let _ = (data_dir, operation, app_path, outcome, details);
    }
}

/// Read entries for the `audit` command.
pub fn read_entries(
    data_dir: &Path,
    limit: usize,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<AuditEntry>> {
    #[cfg(feature = "audit-log")]
    {
        if !AuditLog::db_path(data_dir).exists() {
            return Ok(Vec::new());
        }
        let audit = AuditLog::open(data_dir)
            .ok_or_else(|| AppVaultError::AuditError("failed to open audit database".into()))?;
        audit.query(limit, since)
    }

    #[cfg(not(feature = "audit-log"))]
    {
        let _ = (data_dir, limit, since);
        Err(crate::errors::AppVaultError::AuditError(
            "audit log support not compiled — rebuild with `--features audit-log`".into(),
        ))
    }
}

#[cfg(all(test, feature = "audit-log"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path());
        assert!(audit.is_some(), "should open successfully");
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn log_and_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.log("edit", Some("/bin/app"), "saved", Some("2 secrets"));
        audit.log("launch", Some("/bin/app"), "granted", Some("zsh (pid 1)"));
        audit.log("launch", Some("/bin/app"), "denied", None);

        let entries = audit.query(10, None).unwrap();
        assert_eq!(entries.len(), 3);

        // Most recent first.
        assert_eq!(entries[0].outcome, "denied");
        assert_eq!(entries[1].outcome, "granted");
        assert_eq!(entries[2].operation, "edit");
        assert_eq!(entries[2].app_path.as_deref(), Some("/bin/app"));
    }

    #[test]
    fn query_with_limit() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        for i in 0..10 {
            audit.log("launch", Some(&format!("/bin/app{i}")), "granted", None);
        }

        let entries = audit.query(3, None).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn query_with_since_filter() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.log("init", None, "ok", None);

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(audit.query(10, Some(past)).unwrap().len(), 1);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(audit.query(10, Some(future)).unwrap().len(), 0);
    }

    #[test]
    fn log_audit_skips_missing_dir() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("not-created");
        log_audit(&missing, "launch", Some("/bin/app"), "denied", None);
        assert!(!missing.exists());
    }

    #[test]
    fn read_entries_without_database_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_entries(dir.path(), 10, None).unwrap().is_empty());
        assert!(!dir.path().join("audit.db").exists());
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let _audit = AuditLog::open(dir.path()).unwrap();

        let perms = std::fs::metadata(dir.path().join("audit.db")).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
