//! Spawning the launched application.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::process::Command;

use crate::errors::{AppVaultError, Result};

/// Environment handed to a child process.
pub type Environment = HashMap<OsString, OsString>;

/// How a launched process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Exit code, or `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Starts a program with an exact environment and waits for it.
pub trait Spawner {
    fn spawn(&self, program: &str, args: &[String], env: &Environment) -> Result<ExecResult>;
}

/// `std::process::Command` with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandSpawner;

impl Spawner for CommandSpawner {
    fn spawn(&self, program: &str, args: &[String], env: &Environment) -> Result<ExecResult> {
        let status = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env)
            .status()
            .map_err(|source| AppVaultError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;

        Ok(ExecResult {
            exit_code: status.code(),
        })
    }
}

/// Overlay `secrets` on top of `parent`.  Secret names win on collision;
/// nothing else is filtered.
pub fn merge_environment<I>(parent: I, secrets: &HashMap<String, String>) -> Environment
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: Environment = parent.into_iter().collect();
    for (name, value) in secrets {
        env.insert(OsString::from(name), OsString::from(value));
    }
    env
}

/// Look up a variable in an `Environment` by `&str`.
pub fn env_get<'a>(env: &'a Environment, name: &str) -> Option<&'a OsStr> {
    env.get(OsStr::new(name)).map(OsString::as_os_str)
}
