//! File-backed snapshot store.
//!
//! 1. A missing file loads as the empty set (first run == cold start).
//! 2. Save is a full replace and survives a new store instance (restart).
//! 3. The document is human-readable JSON with every account attribute.
//! 4. Reset removes the file and is a no-op when already absent.
//! 5. A foreign schema tag or unparsable file is an error, not an empty set.
//! 6. Saving leaves no temp files behind.

use usync_schemas::{Account, AccountSet};
use usync_state::{JsonFileStore, SnapshotStore, SNAPSHOT_SCHEMA};

fn set(accounts: &[(&str, &str)]) -> AccountSet {
    accounts
        .iter()
        .map(|(email, pw)| Account::new(*email, 0, "ssapi", *pw))
        .collect()
}

#[test]
fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("current_users.json"));
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn save_replaces_and_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_users.json");

    let store = JsonFileStore::new(&path);
    store.save(&set(&[("1001", "a"), ("1002", "b")])).unwrap();
    store.save(&set(&[("1002", "b2")])).unwrap();

    let reopened = JsonFileStore::new(&path);
    let loaded = reopened.load().unwrap();
    assert_eq!(loaded, set(&[("1002", "b2")]));
}

#[test]
fn document_is_human_inspectable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("applied.json");
    let store = JsonFileStore::new(&path);
    store.save(&set(&[("2002", "x"), ("1001", "y")])).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains('\n'), "expected pretty-printed output");

    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["schema"], SNAPSHOT_SCHEMA);
    assert_eq!(v["accounts"][0]["email"], "1001", "accounts sorted by email");
    assert_eq!(v["accounts"][0]["inbound_tag"], "ssapi");
    assert_eq!(v["accounts"][0]["level"], 0);
    assert_eq!(v["accounts"][1]["password"], "x");
}

#[test]
fn reset_removes_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_users.json");
    let store = JsonFileStore::new(&path);

    store.save(&set(&[("1001", "a")])).unwrap();
    assert!(path.exists());
    store.reset().unwrap();
    assert!(!path.exists());
    store.reset().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn foreign_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_users.json");
    std::fs::write(&path, r#"{"schema":"other.v9","accounts":[]}"#).unwrap();

    let err = JsonFileStore::new(&path).load().unwrap_err();
    assert!(err.to_string().contains("schema mismatch"));
}

#[test]
fn garbage_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_users.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(JsonFileStore::new(&path).load().is_err());
}

#[test]
fn save_creates_parent_dir_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("state");
    let path = nested.join("current_users.json");
    let store = JsonFileStore::new(&path);

    store.save(&set(&[("1001", "a")])).unwrap();
    store.save(&set(&[("1001", "b")])).unwrap();

    let entries: Vec<_> = std::fs::read_dir(&nested)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 1, "unexpected files: {entries:?}");
}
