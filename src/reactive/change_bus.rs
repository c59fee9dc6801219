//! ChangeBus — in-process publish/subscribe keyed by collection name.
//!
//! Every local write publishes the full updated collection to the listeners of
//! that collection. Delivery is synchronous with the write and follows
//! registration order; there is no queuing or coalescing.
//!
//! Each snapshot carries a version taken while the write still held the store
//! lock, so versions follow storage order. Deliveries are serialized per bus,
//! and a listener is never handed a snapshot older than one it has already
//! seen. When two threads write concurrently, the write that stored last is
//! the one every listener sees last.
//!
//! The listeners of a collection are read once when a snapshot's delivery
//! starts. A listener added by a callback first hears the next write; one
//! removed by a callback may still receive the snapshot in flight.
//!
//! The listener map is released before any callback runs, so callbacks may
//! subscribe, unsubscribe or write to the store. The delivery lock is
//! re-entrant for that reason.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use crate::types::Document;

/// Identifies a registered listener; pass it to [`ChangeBus::off`].
pub type ListenerId = u64;

/// Closure type for snapshot listeners.
pub type SnapshotListener = dyn Fn(&[Document]) + Send + Sync;

struct Entry {
    id: ListenerId,
    callback: Arc<SnapshotListener>,
    /// Newest version delivered to this listener.
    seen: Arc<AtomicU64>,
}

pub struct ChangeBus {
    listeners: Mutex<HashMap<String, Vec<Entry>>>,
    /// Newest version published per collection.
    published: Mutex<HashMap<String, u64>>,
    delivery: ReentrantMutex<()>,
    next_id: AtomicU64,
    next_version: AtomicU64,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            published: Mutex::new(HashMap::new()),
            delivery: ReentrantMutex::new(()),
            next_id: AtomicU64::new(1),
            next_version: AtomicU64::new(1),
        }
    }

    /// Register `listener` for snapshots of `collection`.
    pub fn on(&self, collection: &str, listener: Arc<SnapshotListener>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(Entry {
                id,
                callback: listener,
                seen: Arc::new(AtomicU64::new(0)),
            });
        id
    }

    /// Remove a listener. Does nothing if it is not registered.
    pub fn off(&self, collection: &str, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(collection) {
            list.retain(|entry| entry.id != id);
            if list.is_empty() {
                listeners.remove(collection);
            }
        }
    }

    /// Reserve the version for a snapshot about to be stored. Call it while
    /// holding whatever lock orders the writes.
    pub fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Deliver `snapshot` to every listener of `collection` under a fresh
    /// version.
    pub fn emit(&self, collection: &str, snapshot: &[Document]) {
        self.publish(collection, self.next_version(), snapshot);
    }

    /// Deliver `snapshot`, stored as `version`, to every listener of
    /// `collection`. Dropped if a newer version was already published.
    ///
    /// A panicking listener is logged and skipped; it cannot stop delivery to
    /// the others or unwind into the write that triggered the publish.
    pub fn publish(&self, collection: &str, version: u64, snapshot: &[Document]) {
        let _delivery = self.delivery.lock();
        {
            let mut published = self.published.lock();
            let newest = published.entry(collection.to_string()).or_insert(0);
            if *newest >= version {
                tracing::debug!(collection, version, newest = *newest, "dropping stale snapshot");
                return;
            }
            *newest = version;
        }

        let targets: Vec<(Arc<SnapshotListener>, Arc<AtomicU64>)> = {
            let listeners = self.listeners.lock();
            match listeners.get(collection) {
                Some(list) => list
                    .iter()
                    .map(|entry| (Arc::clone(&entry.callback), Arc::clone(&entry.seen)))
                    .collect(),
                None => return,
            }
        };
        for (cb, seen) in targets {
            // A callback that wrote back has already delivered something newer.
            if seen.fetch_max(version, Ordering::SeqCst) >= version {
                continue;
            }
            invoke(collection, cb.as_ref(), snapshot);
        }
    }

    /// Hand listener `id` the current contents of `collection`, as returned by
    /// `read`, in order with any concurrent publishes.
    ///
    /// Used for the first snapshot of a subscription. Does nothing if `id` is
    /// no longer registered.
    pub fn deliver_current<F>(&self, collection: &str, id: ListenerId, read: F)
    where
        F: FnOnce() -> Vec<Document>,
    {
        let _delivery = self.delivery.lock();
        let target = self.listeners.lock().get(collection).and_then(|list| {
            list.iter()
                .find(|entry| entry.id == id)
                .map(|entry| (Arc::clone(&entry.callback), Arc::clone(&entry.seen)))
        });
        let (cb, seen) = match target {
            Some(target) => target,
            None => return,
        };

        // Anything published so far is already part of what `read` returns.
        let newest = self.published.lock().get(collection).copied().unwrap_or(0);
        seen.fetch_max(newest, Ordering::SeqCst);
        let snapshot = read();
        invoke(collection, cb.as_ref(), &snapshot);
    }

    /// Number of listeners registered for `collection`.
    pub fn listener_count(&self, collection: &str) -> usize {
        self.listeners
            .lock()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(collection: &str, cb: &SnapshotListener, snapshot: &[Document]) {
    let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(snapshot)));
    if delivered.is_err() {
        tracing::error!(collection, "snapshot listener panicked");
    }
}
