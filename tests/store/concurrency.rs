//! Local writes racing on several threads: subscribers must end on the state
//! that was stored last.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use class_store::doc;
use class_store::storage::{LocalStore, MemoryStorage};
use class_store::types::Document;
use class_store::CollectionStore;
use parking_lot::Mutex;

fn sorted(mut docs: Vec<Document>) -> Vec<Document> {
    docs.sort_by(|a, b| a.id().cmp(&b.id()));
    docs
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_subscriber_does_not_leave_others_on_a_stale_snapshot() {
    let store = Arc::new(CollectionStore::local_only(Arc::new(LocalStore::<MemoryStorage>::in_memory())));

    // The first subscriber stalls on the snapshot of the first save.
    let calls = Arc::new(AtomicUsize::new(0));
    let slow_calls = Arc::clone(&calls);
    let slow_last = Arc::new(Mutex::new(Vec::<Document>::new()));
    let slow_sink = Arc::clone(&slow_last);
    let _slow = store.subscribe("chat", move |docs| {
        if slow_calls.fetch_add(1, Ordering::SeqCst) == 1 {
            std::thread::sleep(Duration::from_millis(300));
        }
        *slow_sink.lock() = docs.to_vec();
    });

    let last = Arc::new(Mutex::new(Vec::<Document>::new()));
    let sink = Arc::clone(&last);
    let _fast = store.subscribe("chat", move |docs| *sink.lock() = docs.to_vec());

    let first = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.save("chat", doc!({"id": "m1"})).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.save("chat", doc!({"id": "m2"})).await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let stored = sorted(store.snapshot("chat"));
    assert_eq!(stored.len(), 2);
    assert_eq!(sorted(last.lock().clone()), stored);
    assert_eq!(sorted(slow_last.lock().clone()), stored);
}

#[test]
fn racing_threads_leave_every_subscriber_on_the_stored_state() {
    let store = Arc::new(CollectionStore::local_only(Arc::new(LocalStore::<MemoryStorage>::in_memory())));
    let views: Vec<Arc<Mutex<Vec<Document>>>> = (0..3)
        .map(|_| {
            let view = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&view);
            // Dropping the handle keeps the subscription alive.
            let _ = store.subscribe("chat", move |docs| *sink.lock() = docs.to_vec());
            view
        })
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                for n in 0..25 {
                    runtime
                        .block_on(store.save("chat", doc!({"id": format!("t{t}-{n}")})))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = sorted(store.snapshot("chat"));
    assert_eq!(stored.len(), 200);
    for view in views {
        assert_eq!(sorted(view.lock().clone()), stored);
    }
}
