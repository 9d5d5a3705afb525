//! Access policy: decides whether a launch may receive its secrets.
//!
//! The launcher asks the policy *before* it touches the key vault.  A
//! policy only ever sees secret names, never values.

use std::fmt;

use dialoguer::Confirm;
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};

use crate::errors::{AppVaultError, Result};

/// Identity of the process asking for a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Executable name of the caller, or `"unknown"`.
    pub name: String,
    /// Process id of the caller.
    pub pid: u32,
}

impl CallerContext {
    pub fn new(name: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            pid,
        }
    }

    /// The parent of the current process: whoever ran `appvault launch`.
    pub fn parent_process() -> Self {
        let mut system = System::new();

        let Ok(me) = sysinfo::get_current_pid() else {
            return Self::new("unknown", 0);
        };
        system.refresh_processes(ProcessesToUpdate::Some(&[me]), true);

        let Some(parent) = system.process(me).and_then(|p| p.parent()) else {
            return Self::new("unknown", 0);
        };
        system.refresh_processes(ProcessesToUpdate::Some(&[parent]), true);

        let name = system
            .process(parent)
            .map(|p| p.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Self::new(name, parent.as_u32())
    }
}

impl fmt::Display for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.name, self.pid)
    }
}

/// Everything a policy gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub app_path: &'a str,
    pub args: &'a [String],
    pub secret_names: &'a [String],
    pub caller: &'a CallerContext,
}

/// Yes/no decision for a launch request.
///
/// `Ok(false)` is a denial (including a user dismissing a prompt);
/// `Err` means the policy itself could not run.
pub trait AccessPolicy {
    fn check(&self, request: &AccessRequest<'_>) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Built-in policies
// ---------------------------------------------------------------------------

/// Grants everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

impl AccessPolicy for AllowAllPolicy {
    fn check(&self, _request: &AccessRequest<'_>) -> Result<bool> {
        Ok(true)
    }
}

/// Denies everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllPolicy;

impl AccessPolicy for DenyAllPolicy {
    fn check(&self, _request: &AccessRequest<'_>) -> Result<bool> {
        Ok(false)
    }
}

/// One entry of an allow list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowRule {
    /// Application path, compared verbatim.
    pub app: String,

    /// Caller executable names allowed to launch it; empty means any.
    #[serde(default)]
    pub callers: Vec<String>,
}

/// Grants requests matching one of its rules.
#[derive(Debug, Clone, Default)]
pub struct AllowListPolicy {
    rules: Vec<AllowRule>,
}

impl AllowListPolicy {
    pub fn new(rules: Vec<AllowRule>) -> Self {
        Self { rules }
    }
}

impl AccessPolicy for AllowListPolicy {
    fn check(&self, request: &AccessRequest<'_>) -> Result<bool> {
        Ok(self.rules.iter().any(|rule| {
            rule.app == request.app_path
                && (rule.callers.is_empty() || rule.callers.iter().any(|c| *c == request.caller.name))
        }))
    }
}

/// Asks the user on the terminal.  Defaults to "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptPolicy;

impl AccessPolicy for PromptPolicy {
    fn check(&self, request: &AccessRequest<'_>) -> Result<bool> {
        eprintln!("{}", describe_request(request));

        let answer = Confirm::new()
            .with_prompt("Inject these secrets?")
            .default(false)
            .interact_opt()
            .map_err(|e| AppVaultError::PolicyError(format!("permission prompt: {e}")))?;

        // Esc / Ctrl-C is a refusal, not an error.
        Ok(answer.unwrap_or(false))
    }
}

/// Multi-line summary of a request, shown before the prompt.
pub fn describe_request(request: &AccessRequest<'_>) -> String {
    let mut text = format!(
        "{} wants to launch {}",
        request.caller, request.app_path
    );
    if !request.args.is_empty() {
        text.push_str(&format!(" {}", request.args.join(" ")));
    }
    if request.secret_names.is_empty() {
        text.push_str("\n  (no secrets configured)");
    } else {
        text.push_str("\n  with secrets: ");
        text.push_str(&request.secret_names.join(", "));
    }
    text
}
