//! End-to-end flows through CollectionStore as feature modules use it.

use std::sync::Arc;

use class_store::doc;
use class_store::mode::LocalOnly;
use class_store::remote::{MemoryRemote, RemoteStore};
use class_store::storage::{LocalStore, MemoryStorage};
use class_store::types::Document;
use class_store::{CollectionStore, CollectionStoreOptions};
use parking_lot::Mutex;

// ============================================================================
// Helpers
// ============================================================================

fn offline_store() -> CollectionStore<MemoryStorage> {
    CollectionStore::local_only(Arc::new(LocalStore::in_memory()))
}

/// A store whose remote fails every call.
fn failing_store() -> CollectionStore<MemoryStorage> {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_failing(true);
    let remote: Arc<dyn RemoteStore> = remote;
    CollectionStore::new(CollectionStoreOptions {
        local: Arc::new(LocalStore::in_memory()),
        remote: Some(remote),
        mode: None,
        config: Default::default(),
        on_fallback: None,
    })
}

fn recorder() -> (Arc<Mutex<Vec<Vec<Document>>>>, impl Fn(&[Document]) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |docs: &[Document]| sink.lock().push(docs.to_vec()))
}

fn sorted(mut docs: Vec<Document>) -> Vec<Document> {
    docs.sort_by(|a, b| a.id().cmp(&b.id()));
    docs
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn generated_id_then_merge() {
    let store = offline_store();
    let first = store.save("students", doc!({"name": "Omar"})).await.unwrap();
    let id = first.id().unwrap().to_string();
    assert!(!id.is_empty());

    store
        .save("students", doc!({"id": id.clone(), "points": 10}))
        .await
        .unwrap();

    assert_eq!(
        store.snapshot("students"),
        vec![doc!({"id": id, "name": "Omar", "points": 10})]
    );
}

#[tokio::test]
async fn always_failing_remote_still_delivers() {
    let store = failing_store();
    let (log, cb) = recorder();
    let _sub = store.subscribe("quizzes", cb);

    // The remote watch fails on connect and the subscription lands on local.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while log.lock().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::task::yield_now().await;
    }
    assert_eq!(*log.lock(), vec![Vec::<Document>::new()]);

    store
        .save("quizzes", doc!({"id": "q1", "title": "T"}))
        .await
        .unwrap();
    assert_eq!(
        log.lock().last().cloned(),
        Some(vec![doc!({"id": "q1", "title": "T"})])
    );
}

#[tokio::test]
async fn removing_a_missing_document_is_fine() {
    let store = offline_store();
    store.save("students", doc!({"id": "s1"})).await.unwrap();

    store.remove("students", "nonexistent").await.unwrap();
    assert_eq!(store.snapshot("students"), vec![doc!({"id": "s1"})]);
}

#[tokio::test]
async fn independent_subscribers_see_the_same_sequence() {
    let store = offline_store();
    let (a, cb_a) = recorder();
    let (b, cb_b) = recorder();
    let _sa = store.subscribe("chat", cb_a);
    let _sb = store.subscribe("chat", cb_b);

    store.save("chat", doc!({"id": "m1", "text": "hello"})).await.unwrap();

    assert_eq!(a.lock().len(), 2);
    assert_eq!(*a.lock(), *b.lock());
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn saving_twice_yields_the_union_with_second_winning() {
    let store = offline_store();
    let doc = doc!({"id": "s1", "name": "Omar", "points": 1});
    store.save("students", doc.clone()).await.unwrap();
    store
        .save("students", doc!({"id": "s1", "points": 2, "grade": "A"}))
        .await
        .unwrap();
    store.save("students", doc!({"id": "s1", "points": 2, "grade": "A"})).await.unwrap();

    assert_eq!(
        store.snapshot("students"),
        vec![doc!({"id": "s1", "name": "Omar", "points": 2, "grade": "A"})]
    );
}

#[tokio::test]
async fn update_partial_never_creates() {
    let store = offline_store();
    store.save("students", doc!({"id": "s1"})).await.unwrap();
    let (log, cb) = recorder();
    let _sub = store.subscribe("students", cb);

    store
        .update_partial("students", "ghost", doc!({"points": 9}).into_fields())
        .await
        .unwrap();

    assert_eq!(store.snapshot("students"), vec![doc!({"id": "s1"})]);
    assert_eq!(log.lock().len(), 1, "no change published");
}

#[tokio::test]
async fn first_snapshot_is_the_state_at_subscribe_time() {
    let store = offline_store();
    store.save("chat", doc!({"id": "m1"})).await.unwrap();

    let (log, cb) = recorder();
    let _sub = store.subscribe("chat", cb);
    store.save("chat", doc!({"id": "m2"})).await.unwrap();

    let log = log.lock();
    assert_eq!(log[0], vec![doc!({"id": "m1"})]);
    assert_eq!(log[1].len(), 2);
}

#[tokio::test]
async fn failing_remote_matches_offline_behavior() {
    async fn run(store: &CollectionStore<MemoryStorage>) -> Vec<Document> {
        store.save("students", doc!({"id": "a", "n": 1})).await.unwrap();
        store.save("students", doc!({"id": "b", "n": 2})).await.unwrap();
        store.save("students", doc!({"id": "a", "m": 3})).await.unwrap();
        store
            .update_partial("students", "b", doc!({"n": 20}).into_fields())
            .await
            .unwrap();
        store
            .update_partial("students", "zzz", doc!({"n": 0}).into_fields())
            .await
            .unwrap();
        store.remove("students", "missing").await.unwrap();
        store.save("students", doc!({"id": "c"})).await.unwrap();
        store.remove("students", "c").await.unwrap();
        sorted(store.snapshot("students"))
    }

    let offline = offline_store();
    let failing = failing_store();
    let forced_local = CollectionStore::new(CollectionStoreOptions {
        local: Arc::new(LocalStore::in_memory()),
        remote: Some(Arc::new(MemoryRemote::new()) as Arc<dyn RemoteStore>),
        mode: Some(Arc::new(LocalOnly)),
        config: Default::default(),
        on_fallback: None,
    });

    let expected = run(&offline).await;
    assert_eq!(
        expected,
        vec![
            doc!({"id": "a", "n": 1, "m": 3}),
            doc!({"id": "b", "n": 20}),
        ]
    );
    assert_eq!(run(&failing).await, expected);
    assert_eq!(run(&forced_local).await, expected);
}

#[tokio::test]
async fn full_replace_round_trips_through_the_facade_store() {
    let store = offline_store();
    let docs = vec![
        doc!({"id": "x", "nested": {"deep": [1, 2, {"k": null}]}}),
        doc!({"id": "y", "flag": true}),
    ];
    store.local().write_collection("misc", &docs).unwrap();
    assert_eq!(sorted(store.snapshot("misc")), sorted(docs));
}
