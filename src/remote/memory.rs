//! MemoryRemote — an in-process `RemoteStore` + `BlobStore`.
//!
//! Behaves like a single-node real-time document database: merge writes,
//! idempotent deletes, patches that require an existing document, and watches
//! that push the full collection after every change. Failure injection
//! (`set_failing`) and connection drops (`disconnect_all`) make it suitable for
//! exercising the facade's fallback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::RemoteError,
    types::{Document, Fields},
};

use super::{BlobStore, RemoteStore, RemoteWatch, RemoteWatchSender};

/// A stored blob and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

pub struct MemoryRemote {
    /// collection name → (document id → document)
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
    watchers: Mutex<HashMap<String, Vec<RemoteWatchSender>>>,
    blobs: Mutex<HashMap<String, StoredBlob>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    base_url: String,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_base_url("https://storage.example.test")
    }

    /// Blob URLs are formed as `<base_url>/<path>`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
            blobs: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// When `true`, every call fails with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total number of calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current remote contents of `collection`, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn blob(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.lock().get(path).cloned()
    }

    /// Open watches on `collection` whose receiver is still alive.
    pub fn watcher_count(&self, collection: &str) -> usize {
        self.watchers
            .lock()
            .get(collection)
            .map(|list| list.iter().filter(|w| !w.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every open watch, sending each a `Disconnected` error first.
    pub fn disconnect_all(&self) {
        let watchers: Vec<RemoteWatchSender> = self
            .watchers
            .lock()
            .drain()
            .flat_map(|(_, list)| list)
            .collect();
        for watcher in watchers {
            watcher.send(Err(RemoteError::Disconnected));
        }
    }

    fn check(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("injected failure".into()));
        }
        Ok(())
    }

    /// Push the current contents of `collection` to its watchers.
    fn notify(&self, collection: &str) {
        let snapshot = self.documents(collection);
        let mut watchers = self.watchers.lock();
        if let Some(list) = watchers.get_mut(collection) {
            list.retain(|w| w.send(Ok(snapshot.clone())));
        }
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn watch(&self, collection: &str) -> Result<RemoteWatch, RemoteError> {
        self.check()?;
        let (tx, watch) = RemoteWatch::channel();
        tx.send(Ok(self.documents(collection)));
        self.watchers
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(tx);
        Ok(watch)
    }

    async fn merge_set(&self, collection: &str, doc: &Document) -> Result<(), RemoteError> {
        self.check()?;
        let id = doc
            .id()
            .ok_or_else(|| RemoteError::Rejected("document has no id".into()))?
            .to_string();
        {
            let mut collections = self.collections.lock();
            let docs = collections.entry(collection.to_string()).or_default();
            docs.entry(id)
                .and_modify(|existing| existing.merge(doc.fields()))
                .or_insert_with(|| doc.clone());
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.check()?;
        let removed = self
            .collections
            .lock()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    async fn patch(&self, collection: &str, id: &str, fields: &Fields) -> Result<(), RemoteError> {
        self.check()?;
        {
            let mut collections = self.collections.lock();
            let existing = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| RemoteError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            existing.merge(fields);
        }
        self.notify(collection);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryRemote {
    async fn put(&self, path: &str, bytes: &[u8], mime_type: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.blobs.lock().insert(
            path.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                mime_type: mime_type.to_string(),
            },
        );
        Ok(())
    }

    async fn public_url(&self, path: &str) -> Result<String, RemoteError> {
        self.check()?;
        if !self.blobs.lock().contains_key(path) {
            return Err(RemoteError::NotFound {
                collection: "blobs".to_string(),
                id: path.to_string(),
            });
        }
        Ok(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }
}
