use serde_json::json;

use super::{load, save, FileStorage, MemoryStorage, Storage};
use crate::error::StorageError;

#[test]
fn test_memory_get_set_remove() {
    let storage = MemoryStorage::new();
    assert!(storage.get("missing").unwrap().is_none());

    storage.set("k", &json!({"a": 1})).unwrap();
    assert_eq!(storage.get("k").unwrap(), Some(json!({"a": 1})));

    storage.remove("k").unwrap();
    assert!(storage.get("k").unwrap().is_none());
    assert!(storage.is_empty());
}

#[test]
fn test_memory_quota_rejects_oversized_blob() {
    let storage = MemoryStorage::with_quota(16);
    storage.set("small", &json!([1, 2])).unwrap();

    let result = storage.set("big", &json!(["aaaaaaaaaaaaaaaaaaaaaaaa"]));
    match result {
        Err(StorageError::CapacityExceeded { key, limit, .. }) => {
            assert_eq!(key, "big");
            assert_eq!(limit, 16);
        }
        other => panic!("Expected CapacityExceeded, got {:?}", other),
    }

    // Failed write leaves previous contents alone
    assert_eq!(storage.get("small").unwrap(), Some(json!([1, 2])));
    assert!(storage.get("big").unwrap().is_none());
}

#[test]
fn test_memory_quota_counts_replaced_key_once() {
    let storage = MemoryStorage::with_quota(12);
    storage.set("k", &json!("1234567")).unwrap();
    // Overwriting the same key only counts the new value
    storage.set("k", &json!("7654321")).unwrap();
    assert_eq!(storage.bytes_used(), 9);
}

#[test]
fn test_typed_load_save() {
    let storage = MemoryStorage::new();
    save(&storage, "numbers", &vec![1u32, 2, 3]).unwrap();

    let loaded: Option<Vec<u32>> = load(&storage, "numbers").unwrap();
    assert_eq!(loaded, Some(vec![1, 2, 3]));

    let missing: Option<Vec<u32>> = load(&storage, "nothing").unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_file_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("nested"));

    storage.set("bot_detection_thresholds", &json!({"challenge": 35.0, "block": 60.0})).unwrap();

    let loaded = storage.get("bot_detection_thresholds").unwrap().unwrap();
    assert_eq!(loaded["block"], json!(60.0));
    assert!(dir.path().join("nested").join("bot_detection_thresholds.json").exists());

    storage.remove("bot_detection_thresholds").unwrap();
    assert!(storage.get("bot_detection_thresholds").unwrap().is_none());
}

#[test]
fn test_file_quota() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().to_path_buf()).with_quota(Some(8));

    let err = storage.set("k", &json!({"long": "value that will not fit"})).unwrap_err();
    assert!(err.is_capacity());
    assert!(storage.get("k").unwrap().is_none());
}

#[test]
fn test_file_key_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().to_path_buf());

    storage.set("../escape", &json!(1)).unwrap();
    assert!(dir.path().join("___escape.json").exists());
}
