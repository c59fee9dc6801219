//! Tests for LocalStore: full-replace persistence, per-document helpers and
//! change publication.

use std::sync::Arc;

use class_store::config::StoreConfig;
use class_store::doc;
use class_store::error::StorageError;
use class_store::storage::{HostStorage, LocalStore, MemoryStorage};
use class_store::types::Document;
use parking_lot::Mutex;
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn record(local: &LocalStore<MemoryStorage>, collection: &str) -> Arc<Mutex<Vec<Vec<Document>>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    local
        .bus()
        .on(collection, Arc::new(move |docs: &[Document]| sink.lock().push(docs.to_vec())));
    log
}

fn sorted(mut docs: Vec<Document>) -> Vec<Document> {
    docs.sort_by(|a, b| a.id().cmp(&b.id()));
    docs
}

// ============================================================================
// read / write
// ============================================================================

#[test]
fn missing_collection_reads_empty() {
    let local = LocalStore::in_memory();
    assert!(local.read_collection("students").is_empty());
}

#[test]
fn write_then_read_is_set_equal() {
    let local = LocalStore::in_memory();
    let docs = vec![
        doc!({"id": "b", "name": "Lina"}),
        doc!({"id": "a", "name": "Omar", "tags": ["x", "y"]}),
    ];
    local.write_collection("students", &docs).unwrap();
    assert_eq!(sorted(local.read_collection("students")), sorted(docs));

    // Full replace, not append.
    local.write_collection("students", &[doc!({"id": "c"})]).unwrap();
    assert_eq!(local.read_collection("students"), vec![doc!({"id": "c"})]);
}

#[test]
fn corrupt_data_reads_empty() {
    let local = LocalStore::in_memory();
    local
        .host()
        .set_item(&local.key_for("quizzes"), "{not json")
        .unwrap();
    assert!(local.read_collection("quizzes").is_empty());

    // A JSON value that is not an array of objects is corrupt too.
    local
        .host()
        .set_item(&local.key_for("quizzes"), "[1, 2]")
        .unwrap();
    assert!(local.read_collection("quizzes").is_empty());
}

#[test]
fn keys_use_the_configured_prefix() {
    let config = StoreConfig {
        key_prefix: Some("app_".into()),
        ..Default::default()
    };
    let local = LocalStore::new(MemoryStorage::new(), &config);
    local.write_collection("chat", &[doc!({"id": "m1"})]).unwrap();

    assert_eq!(local.key_for("chat"), "app_chat");
    let stored = local.host().get_item("app_chat").unwrap().unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&stored).unwrap(), json!([{"id": "m1"}]));
    assert_eq!(local.collection_names().unwrap(), vec!["chat".to_string()]);
}

#[test]
fn write_publishes_the_written_list() {
    let local = LocalStore::in_memory();
    let log = record(&local, "chat");
    let other = record(&local, "students");

    let docs = vec![doc!({"id": "m1", "text": "hi"})];
    local.write_collection("chat", &docs).unwrap();

    assert_eq!(*log.lock(), vec![docs]);
    assert!(other.lock().is_empty());
}

#[test]
fn quota_errors_propagate_and_publish_nothing() {
    let local = LocalStore::new(MemoryStorage::with_quota(32), &StoreConfig::default());
    let log = record(&local, "students");

    let big = doc!({"id": "s1", "bio": "x".repeat(64)});
    let err = local.write_collection("students", &[big]).unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    assert!(log.lock().is_empty());
    assert!(local.read_collection("students").is_empty());
}

// ============================================================================
// upsert / patch / remove
// ============================================================================

#[test]
fn upsert_merges_shallowly_over_existing() {
    let local = LocalStore::in_memory();
    local
        .upsert("students", doc!({"id": "s1", "name": "Omar", "meta": {"a": 1}}))
        .unwrap();
    let stored = local
        .upsert("students", doc!({"id": "s1", "points": 10, "meta": {"b": 2}}))
        .unwrap();

    let expected = doc!({"id": "s1", "name": "Omar", "points": 10, "meta": {"b": 2}});
    assert_eq!(stored, expected);
    assert_eq!(local.read_collection("students"), vec![expected]);
}

#[test]
fn upsert_appends_new_ids() {
    let local = LocalStore::in_memory();
    local.upsert("students", doc!({"id": "s1"})).unwrap();
    local.upsert("students", doc!({"id": "s2"})).unwrap();
    assert_eq!(local.read_collection("students").len(), 2);
}

#[test]
fn upsert_requires_an_id() {
    let local = LocalStore::in_memory();
    assert!(local.upsert("students", doc!({"name": "nobody"})).is_err());
    assert!(local.read_collection("students").is_empty());
}

#[test]
fn patch_updates_existing_only() {
    let local = LocalStore::in_memory();
    local.upsert("students", doc!({"id": "s1", "name": "Omar"})).unwrap();
    let log = record(&local, "students");

    let fields = doc!({"points": 3}).into_fields();
    assert!(local.patch("students", "s1", &fields).unwrap());
    assert_eq!(
        local.get_document("students", "s1"),
        Some(doc!({"id": "s1", "name": "Omar", "points": 3}))
    );

    assert!(!local.patch("students", "ghost", &fields).unwrap());
    assert_eq!(local.read_collection("students").len(), 1);
    // Only the successful patch published.
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn remove_missing_is_a_silent_no_op() {
    let local = LocalStore::in_memory();
    local.upsert("students", doc!({"id": "s1"})).unwrap();
    let log = record(&local, "students");

    assert!(!local.remove_document("students", "nonexistent").unwrap());
    assert!(log.lock().is_empty());

    assert!(local.remove_document("students", "s1").unwrap());
    assert_eq!(*log.lock(), vec![Vec::<Document>::new()]);
}

#[test]
fn listeners_may_write_back_into_the_store() {
    let local = Arc::new(LocalStore::in_memory());
    let inner = Arc::clone(&local);
    local.bus().on(
        "chat",
        Arc::new(move |docs: &[Document]| {
            if docs.len() == 1 {
                inner.upsert("chat", doc!({"id": "echo"})).unwrap();
            }
        }),
    );

    local.upsert("chat", doc!({"id": "m1"})).unwrap();
    assert_eq!(local.read_collection("chat").len(), 2);
}
