//! Advisory locking around the secrets file.
//!
//! Every write rewrites the whole file, so two processes doing a
//! read-modify-write at the same time would silently drop one of the
//! edits.  Writers hold an exclusive `flock(2)` on a sidecar
//! `<file>.lock`; readers hold a shared one.  The lock is released
//! when the guard is dropped.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::errors::{AppVaultError, Result};

use super::format::{ensure_parent_dir, open_private};

/// How a `StoreLock` is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers at once; blocks while a writer holds the lock.
    Shared,
    /// One writer; blocks until every other holder releases.
    Exclusive,
}

/// RAII guard for the store lock.
#[derive(Debug)]
pub struct StoreLock {
    /// `None` when a shared lock was requested before the data
    /// directory exists: there is nothing on disk to protect yet.
    file: Option<File>,
    mode: LockMode,
}

impl StoreLock {
    /// Lock file path for a given secrets file.
    pub fn path_for(store_path: &Path) -> PathBuf {
        let mut name = store_path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Block until the lock for `store_path` is held in `mode`.
    pub fn acquire(store_path: &Path, mode: LockMode) -> Result<Self> {
        let lock_path = Self::path_for(store_path);

        let parent_missing = lock_path.parent().is_some_and(|p| !p.as_os_str().is_empty() && !p.exists());
        if parent_missing {
            if mode == LockMode::Shared {
                return Ok(Self { file: None, mode });
            }
            ensure_parent_dir(&lock_path)?;
        }

        let file = open_private(&lock_path, false).map_err(|source| AppVaultError::StoreIo {
            path: lock_path.clone(),
            source,
        })?;

        lock_file(&file, mode).map_err(|source| AppVaultError::StoreIo {
            path: lock_path.clone(),
            source,
        })?;

        tracing::debug!(path = %lock_path.display(), ?mode, "acquired store lock");
        Ok(Self {
            file: Some(file),
            mode,
        })
    }

    /// The mode this guard holds.
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // Closing the descriptor releases the lock as well; unlocking
            // first keeps the release independent of other open handles.
            let _ = unlock_file(&file);
        }
    }
}

#[cfg(unix)]
fn lock_file(file: &File, mode: LockMode) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    flock(file.as_raw_fd(), op)
}

#[cfg(unix)]
fn unlock_file(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    flock(file.as_raw_fd(), libc::LOCK_UN)
}

#[cfg(unix)]
fn flock(fd: std::os::unix::io::RawFd, op: libc::c_int) -> std::io::Result<()> {
    loop {
        // SAFETY: `fd` is a valid descriptor owned by a live `File`.
        let rc = unsafe { libc::flock(fd, op) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

// TODO: use LockFileEx on Windows; until then non-Unix builds rely on
// the single-writer assumption.
#[cfg(not(unix))]
fn lock_file(_file: &File, _mode: LockMode) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock_file(_file: &File) -> std::io::Result<()> {
    Ok(())
}
