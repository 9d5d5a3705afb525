//! Integration tests for the encrypted secrets file.

use std::collections::HashMap;
use std::fs;

use appvault::crypto::MasterKey;
use appvault::errors::AppVaultError;
use appvault::store::SecretStore;
use tempfile::TempDir;

fn envs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn secrets_are_encrypted_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();

    store.set("/bin/app", &envs(&[("TOKEN", "abc123")]), &key).unwrap();

    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("/bin/app"));
    assert!(raw.contains("TOKEN"));
    assert!(!raw.contains("abc123"));

    assert_eq!(store.get("/bin/app", &key).unwrap(), envs(&[("TOKEN", "abc123")]));
}

#[test]
fn applications_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();

    store.set("/bin/a", &envs(&[("A_KEY", "1"), ("SHARED", "a")]), &key).unwrap();
    store.set("/bin/b", &envs(&[("SHARED", "b")]), &key).unwrap();

    assert_eq!(store.list_applications().unwrap(), vec!["/bin/a", "/bin/b"]);
    assert_eq!(store.available_keys("/bin/a").unwrap(), vec!["A_KEY", "SHARED"]);
    assert_eq!(store.get("/bin/b", &key).unwrap(), envs(&[("SHARED", "b")]));

    // Replacing one app leaves the other alone.
    store.set("/bin/a", &envs(&[("ONLY", "x")]), &key).unwrap();
    assert_eq!(store.available_keys("/bin/a").unwrap(), vec!["ONLY"]);
    assert_eq!(store.get("/bin/b", &key).unwrap(), envs(&[("SHARED", "b")]));
}

#[test]
fn listing_reflects_set_and_remove() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();

    assert!(store.list_applications().unwrap().is_empty());
    assert!(!store.app_configured("/bin/app").unwrap());

    store.set("/bin/app", &envs(&[("K", "v")]), &key).unwrap();
    assert!(store.app_configured("/bin/app").unwrap());

    assert!(store.remove("/bin/app").unwrap());
    assert!(!store.remove("/bin/app").unwrap());
    assert!(store.list_applications().unwrap().is_empty());
    assert!(store.available_keys("/bin/app").unwrap().is_empty());
}

#[test]
fn empty_map_keeps_app_configured() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();

    store.set("/bin/app", &HashMap::new(), &key).unwrap();
    assert!(store.app_configured("/bin/app").unwrap());
    assert!(store.get("/bin/app", &key).unwrap().is_empty());
}

#[test]
fn wrong_key_fails_closed() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();
    store.set("/bin/app", &envs(&[("A", "1"), ("B", "2")]), &key).unwrap();

    let other = MasterKey::generate();
    assert!(matches!(
        store.get("/bin/app", &other),
        Err(AppVaultError::DecryptionFailed)
    ));
}

#[test]
fn unknown_app_decrypts_to_empty_map() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();
    assert!(store.get("/bin/nothing", &key).unwrap().is_empty());
}

#[test]
fn corrupt_file_is_an_error_not_an_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    fs::write(store.path(), "{ not json").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o600)).unwrap();
    }

    assert!(matches!(
        store.list_applications(),
        Err(AppVaultError::StoreCorrupt { .. })
    ));
}

#[test]
fn invalid_names_are_rejected_without_writing() {
    let dir = TempDir::new().unwrap();
    let store = SecretStore::in_dir(dir.path());
    let key = MasterKey::generate();

    let result = store.set("/bin/app", &envs(&[("BAD=NAME", "v")]), &key);
    assert!(matches!(result, Err(AppVaultError::InvalidSecretName(..))));
    assert!(!store.path().exists());
}
