//! Traits for the remote side: a real-time document database and a blob store.
//!
//! Implementations wrap a connected, authenticated client (Firestore-style
//! document store plus path-addressed object storage). The facade only needs
//! four document primitives and two blob primitives; everything else about the
//! remote protocol stays behind these traits.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::RemoteError,
    types::{Document, Fields},
};

pub use memory::MemoryRemote;

// ============================================================================
// RemoteStore
// ============================================================================

/// A real-time document database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Watch every document of `collection`.
    ///
    /// The returned watch yields the full collection on connect and after
    /// every change. An `Err` item or the end of the stream means the
    /// connection is gone.
    async fn watch(&self, collection: &str) -> Result<RemoteWatch, RemoteError>;

    /// Upsert `doc` by its id, merging: given fields overwrite, others survive.
    async fn merge_set(&self, collection: &str, doc: &Document) -> Result<(), RemoteError>;

    /// Delete by id. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;

    /// Patch fields of an existing document. Fails with
    /// `RemoteError::NotFound` if the document does not exist.
    async fn patch(&self, collection: &str, id: &str, fields: &Fields) -> Result<(), RemoteError>;
}

/// A remote snapshot event: the full collection, or the error that ended the watch.
pub type RemoteSnapshot = Result<Vec<Document>, RemoteError>;

/// Receiving half of a remote watch.
#[derive(Debug)]
pub struct RemoteWatch {
    rx: mpsc::UnboundedReceiver<RemoteSnapshot>,
}

/// Sending half of a remote watch, held by the adapter implementation.
#[derive(Debug, Clone)]
pub struct RemoteWatchSender {
    tx: mpsc::UnboundedSender<RemoteSnapshot>,
}

impl RemoteWatch {
    pub fn channel() -> (RemoteWatchSender, RemoteWatch) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RemoteWatchSender { tx }, RemoteWatch { rx })
    }

    /// Next event, or `None` once the sender side is gone.
    pub async fn next(&mut self) -> Option<RemoteSnapshot> {
        self.rx.recv().await
    }
}

impl RemoteWatchSender {
    /// Send an event. Returns `false` if the watcher has gone away.
    pub fn send(&self, event: RemoteSnapshot) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// BlobStore
// ============================================================================

/// Path-addressed binary storage with public URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing anything already there.
    async fn put(&self, path: &str, bytes: &[u8], mime_type: &str) -> Result<(), RemoteError>;

    /// Public download URL for the object at `path`.
    async fn public_url(&self, path: &str) -> Result<String, RemoteError>;
}
