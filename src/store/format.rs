//! On-disk JSON format of the secrets file and its atomic write.
//!
//! ```json
//! {
//!   "/usr/local/bin/deploy": {
//!     "API_TOKEN": "<base64 nonce | ciphertext | tag>"
//!   }
//! }
//! ```
//!
//! Application paths are the outer keys, used verbatim.  Maps are
//! `BTreeMap`s so the file is written in a stable, sorted order.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::{AppVaultError, Result};

/// Secret name -> ciphertext token, for one application.
pub type EncryptedEnvs = BTreeMap<String, String>;

/// The whole persisted structure: application path -> encrypted envs.
pub type StoreData = BTreeMap<String, EncryptedEnvs>;

/// Mode for the secrets file and its temp/lock siblings.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Mode for a data directory we create ourselves.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Read the secrets file at `path`.
///
/// A missing file is the legitimate "nothing configured yet" state and
/// yields an empty map.  Anything else that goes wrong is an error:
/// an unreadable or corrupt file must never look like an empty store.
pub fn read_store(path: &Path) -> Result<StoreData> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "secrets file absent, store is empty");
            return Ok(StoreData::new());
        }
        Err(source) => return Err(store_io(path, source)),
    };

    let metadata = file.metadata().map_err(|e| store_io(path, e))?;
    check_permissions(path, &metadata)?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| store_io(path, e))?;

    let data: StoreData =
        serde_json::from_str(&contents).map_err(|e| AppVaultError::StoreCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    tracing::debug!(path = %path.display(), applications = data.len(), "loaded secrets file");
    Ok(data)
}

/// Write the secrets file **atomically**.
///
/// 1. Serialize the whole structure to pretty JSON.
/// 2. Write it to `.<name>.tmp` in the same directory, created 0600.
/// 3. fsync, then rename the temp file over the target path.
///
/// The rename ensures readers never see a half-written file.
pub fn write_store(path: &Path, data: &StoreData) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(data).map_err(|e| AppVaultError::StoreCorrupt {
        path: path.to_path_buf(),
        reason: format!("cannot serialize: {e}"),
    })?;
    bytes.push(b'\n');

    ensure_parent_dir(path)?;

    let tmp_path = temp_path(path);
    match fs::remove_file(&tmp_path) {
        Ok(()) => tracing::warn!(path = %tmp_path.display(), "removed stale temp file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(store_io(&tmp_path, e)),
    }

    let result = write_new_file(&tmp_path, &bytes).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| store_io(path, e))
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    tracing::debug!(path = %path.display(), applications = data.len(), "wrote secrets file");
    Ok(())
}

/// Create the parent directory of `path` (0700) if it does not exist.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(parent)
            .map_err(|e| store_io(parent, e))?;
    }

    #[cfg(not(unix))]
    fs::create_dir_all(parent).map_err(|e| store_io(parent, e))?;

    Ok(())
}

/// Open a file for writing with owner-only permissions from the start.
pub(crate) fn open_private(path: &Path, create_new: bool) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    options.open(path)
}

fn write_new_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = open_private(path, true).map_err(|e| store_io(path, e))?;
    file.write_all(bytes).map_err(|e| store_io(path, e))?;
    file.sync_all().map_err(|e| store_io(path, e))?;
    Ok(())
}

/// Temp file beside the target, e.g. `.secrets.json.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ))
}

/// Refuse files readable or writable by group/other.
#[cfg(unix)]
fn check_permissions(path: &Path, metadata: &fs::Metadata) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        tracing::warn!(path = %path.display(), mode = %format!("{mode:o}"), "secrets file has insecure permissions");
        return Err(AppVaultError::InsecurePermissions {
            path: path.to_path_buf(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _metadata: &fs::Metadata) -> Result<()> {
    Ok(())
}

fn store_io(path: &Path, source: std::io::Error) -> AppVaultError {
    AppVaultError::StoreIo {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> StoreData {
        let mut envs = EncryptedEnvs::new();
        envs.insert("TOKEN".into(), "Y2lwaGVy".into());
        let mut data = StoreData::new();
        data.insert("/bin/app".into(), envs);
        data.insert("/bin/empty".into(), EncryptedEnvs::new());
        data
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let data = read_store(&dir.path().join("secrets.json")).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_store(&path, &sample()).unwrap();

        let data = read_store(&path).unwrap();
        assert_eq!(data, sample());
        assert!(!dir.path().join(".secrets.json.tmp").exists());
    }

    #[test]
    fn creates_missing_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/appvault/secrets.json");
        write_store(&path, &sample()).unwrap();
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn stale_temp_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(dir.path().join(".secrets.json.tmp"), b"garbage").unwrap();

        write_store(&path, &sample()).unwrap();
        assert_eq!(read_store(&path).unwrap(), sample());
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_new_file(&path, b"{ not json").unwrap();

        let result = read_store(&path);
        assert!(matches!(result, Err(AppVaultError::StoreCorrupt { .. })));
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_new_file(&path, b"").unwrap();

        assert!(matches!(
            read_store(&path),
            Err(AppVaultError::StoreCorrupt { .. })
        ));
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_new_file(&path, br#"{"/bin/app": ["TOKEN"]}"#).unwrap();

        assert!(matches!(
            read_store(&path),
            Err(AppVaultError::StoreCorrupt { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_store(&path, &sample()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn refuses_group_readable_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        write_store(&path, &sample()).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        match read_store(&path) {
            Err(AppVaultError::InsecurePermissions { mode, .. }) => assert_eq!(mode, 0o640),
            other => panic!("expected InsecurePermissions, got {other:?}"),
        }
    }
}
