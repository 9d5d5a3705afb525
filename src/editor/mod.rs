//! Secret editor: turns the current plaintext secrets of an
//! application into an updated set, or reports that the user gave up.
//!
//! `ExternalEditor` writes the secrets to a private temp file in
//! `KEY=VALUE` form, runs `$VISUAL` / `$EDITOR` / `vi` on it, and
//! parses the result.  The temp file is zero-filled and removed as
//! soon as it has been read.

pub mod dotenv;

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use zeroize::Zeroize;

use crate::errors::{AppVaultError, Result};

use dotenv::{format_env_line, parse_env_text};

/// Result of an edit session.
///
/// `Updated` with an empty map is a request to clear every secret;
/// only `Cancelled` means "leave the store alone".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(HashMap<String, String>),
    Cancelled,
}

/// Something that lets a user edit an application's secrets.
pub trait SecretEditor {
    fn edit(&self, app_path: &str, current: &HashMap<String, String>) -> Result<EditOutcome>;
}

/// Edits secrets in the user's text editor.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
}

impl ExternalEditor {
    /// Use `command` (may include arguments, e.g. `code --wait`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Use the configured editor, else `$VISUAL`, else `$EDITOR`, else `vi`.
    pub fn from_env(configured: Option<&str>) -> Self {
        Self::new(find_editor(configured))
    }
}

impl SecretEditor for ExternalEditor {
    fn edit(&self, app_path: &str, current: &HashMap<String, String>) -> Result<EditOutcome> {
        let tmp_path = write_temp_file(app_path, current)?;

        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            secure_delete(&tmp_path);
            return Err(AppVaultError::EditorError("editor command is empty".into()));
        };

        let status = Command::new(program).args(parts).arg(&tmp_path).status();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                secure_delete(&tmp_path);
                return Err(AppVaultError::EditorError(format!(
                    "failed to launch '{}': {e}",
                    self.command
                )));
            }
        };

        if !status.success() {
            secure_delete(&tmp_path);
            tracing::info!(code = ?status.code(), "editor exited unsuccessfully, treating as cancel");
            return Ok(EditOutcome::Cancelled);
        }

        let read = fs::read_to_string(&tmp_path);
        secure_delete(&tmp_path);
        let mut content = read
            .map_err(|e| AppVaultError::EditorError(format!("failed to read edited file: {e}")))?;

        let outcome = outcome_from_text(&content);
        content.zeroize();
        Ok(outcome)
    }
}

/// Interpret an edited buffer.  A buffer emptied to whitespace cancels.
pub fn outcome_from_text(content: &str) -> EditOutcome {
    if content.trim().is_empty() {
        return EditOutcome::Cancelled;
    }
    EditOutcome::Updated(parse_env_text(content))
}

/// Render the buffer shown to the user, sorted by key.
pub fn render_buffer(app_path: &str, secrets: &HashMap<String, String>) -> String {
    let mut sorted: Vec<(&String, &String)> = secrets.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);

    let mut out = String::new();
    out.push_str(&format!("# AppVault secrets for {app_path}\n"));
    out.push_str("# One KEY=VALUE per line; lines starting with '#' are ignored.\n");
    out.push_str("# Delete every line (empty file) or quit with an error to cancel.\n\n");
    for (key, value) in sorted {
        out.push_str(&format_env_line(key, value));
        out.push('\n');
    }
    out
}

/// Write secrets to a private temp file.  Returns its path.
fn write_temp_file(app_path: &str, secrets: &HashMap<String, String>) -> Result<PathBuf> {
    let filename = format!(
        "appvault-edit-{}-{}.env",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
    );
    let tmp_path = std::env::temp_dir().join(filename);

    // Create the file with restrictive permissions atomically (no TOCTOU race).
    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&tmp_path)
            .map_err(|e| AppVaultError::EditorError(format!("failed to create temp file: {e}")))?
    };

    #[cfg(not(unix))]
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|e| AppVaultError::EditorError(format!("failed to create temp file: {e}")))?;

    let mut buffer = render_buffer(app_path, secrets);
    let written = file.write_all(buffer.as_bytes()).and_then(|()| file.flush());
    buffer.zeroize();

    if let Err(e) = written {
        secure_delete(&tmp_path);
        return Err(AppVaultError::EditorError(format!(
            "failed to write temp file: {e}"
        )));
    }
    Ok(tmp_path)
}

/// Find the user's preferred editor.
fn find_editor(configured: Option<&str>) -> String {
    if let Some(editor) = configured.filter(|e| !e.trim().is_empty()) {
        return editor.to_string();
    }

    for var in ["VISUAL", "EDITOR"] {
        if let Ok(editor) = std::env::var(var) {
            if !editor.trim().is_empty() {
                return editor;
            }
        }
    }

    "vi".to_string()
}

/// Overwrite a file's contents with zeros before deleting it.
/// Best-effort: failures are silently ignored.
fn secure_delete(path: &Path) {
    if let Ok(metadata) = fs::metadata(path) {
        let len = metadata.len() as usize;
        if len > 0 {
            if let Ok(mut file) = fs::OpenOptions::new().write(true).open(path) {
                let zeros = vec![0u8; len];
                let _ = file.write_all(&zeros);
                let _ = file.sync_all();
            }
        }
    }
    let _ = fs::remove_file(path);
}
