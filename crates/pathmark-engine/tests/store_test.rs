//! JSON file store persistence and schema upgrades.

use pathmark_common::grouping::Grouping;
use pathmark_common::record::{
    CapturedElement, LocatorRecord, LocatorSet, ResolutionResult, Strategy,
};
use pathmark_engine::store::{
    JsonFileStore, LogSink, MemoryStore, RecordStore, SCHEMA_VERSION, StoreError,
};
use tempfile::TempDir;

fn sample(id: &str) -> LocatorRecord {
    let captured = CapturedElement {
        id: id.to_string(),
        locators: LocatorSet {
            locator_a: format!("//*[@id=\"{}\"]", id),
            locator_b: format!("#{}", id),
            locator_c: format!("#{}", id),
        },
        ..Default::default()
    };
    LocatorRecord::from_capture(captured, "https://a.test/", Grouping::default())
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Records, log entries and changes survive a reopen
#[test]
fn test_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("records.json");

    {
        let store = JsonFileStore::open(&path).unwrap();
        store.put(sample("one")).unwrap();
        store.put(sample("two")).unwrap();
        assert!(store.delete("two").unwrap());
        assert!(!store.delete("two").unwrap());
        store.append(10, "Saved record one").unwrap();
        store
            .record_change(
                "one",
                11,
                &[ResolutionResult {
                    strategy: Strategy::A,
                    found: true,
                    elapsed_ms: 0.5,
                }],
                "hello",
            )
            .unwrap();
    }

    let store = JsonFileStore::open(&path).unwrap();
    let records = store.get_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "one");
    assert_eq!(records[0].locators, sample("one").locators);
    assert_eq!(store.entries().unwrap()[0].message, "Saved record one");
    let changes = store.changes().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].value, "hello");
    assert_eq!(read_json(&path)["version"], SCHEMA_VERSION);
}

/// Version 1 files hold only records and are rewritten at the current version
#[test]
fn test_upgrades_version_one() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let v1 = serde_json::json!({
        "version": 1,
        "records": [serde_json::to_value(sample("old")).unwrap()],
        "logs": [{ "id": 1, "time": 5, "message": "stale" }]
    });
    std::fs::write(&path, v1.to_string()).unwrap();

    let store = JsonFileStore::open(&path).unwrap();
    assert!(store.get("old").unwrap().is_some());
    assert!(store.entries().unwrap().is_empty());

    let written = read_json(&path);
    assert_eq!(written["version"], SCHEMA_VERSION);
    assert_eq!(written["records"].as_array().unwrap().len(), 1);
    assert!(written["changes"].as_array().unwrap().is_empty());
}

/// Version 2 files keep their log
#[test]
fn test_upgrades_version_two() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let v2 = serde_json::json!({
        "version": 2,
        "records": [],
        "logs": [{ "id": 1, "time": 5, "message": "kept" }]
    });
    std::fs::write(&path, v2.to_string()).unwrap();

    let store = JsonFileStore::open(&path).unwrap();
    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "kept");
    assert_eq!(store.append(6, "next").unwrap().id, 2);
}

/// Files written by a newer schema are refused untouched
#[test]
fn test_rejects_newer_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let original = r#"{"version": 4, "records": []}"#;
    std::fs::write(&path, original).unwrap();

    match JsonFileStore::open(&path) {
        Err(StoreError::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, 4);
            assert_eq!(supported, SCHEMA_VERSION);
        }
        other => panic!("expected version error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
}

/// Garbage in the store file is a JSON error
#[test]
fn test_rejects_invalid_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Json(_))));
}

/// Memory store clones share contents
#[test]
fn test_memory_store_clones_share() {
    let store = MemoryStore::new();
    let view = store.clone();
    store.put(sample("x")).unwrap();
    assert!(view.get("x").unwrap().is_some());
    assert_eq!(view.append(1, "a").unwrap().id, 1);
    assert_eq!(store.append(2, "b").unwrap().id, 2);
}

/// A write that cannot reach disk leaves the store unchanged
#[test]
fn test_failed_write_is_not_applied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let store = JsonFileStore::open(&path).unwrap();
    store.put(sample("kept")).unwrap();

    // A directory where the temporary file goes makes every write fail.
    let blocker = path.with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    assert!(matches!(store.put(sample("lost")), Err(StoreError::Io { .. })));
    assert!(store.append(1, "never written").is_err());
    assert!(store.record_change("kept", 2, &[], "v").is_err());
    assert!(store.delete("kept").is_err());

    assert!(store.get("lost").unwrap().is_none());
    assert!(store.get("kept").unwrap().is_some());
    assert!(store.entries().unwrap().is_empty());
    assert!(store.changes().unwrap().is_empty());

    std::fs::remove_dir(&blocker).unwrap();
    store.put(sample("lost")).unwrap();
    assert_eq!(store.append(3, "written").unwrap().id, 1);

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get_all().unwrap().len(), 2);
    assert_eq!(reopened.entries().unwrap().len(), 1);
}
