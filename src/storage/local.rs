//! LocalStore<H> — collection-scoped JSON persistence over any `HostStorage`.
//!
//! Each collection is one JSON array stored under `<key_prefix><collection>`.
//! Every write replaces the whole array and then publishes the new contents on
//! the store's [`ChangeBus`], which is how local subscribers learn about
//! changes when no remote store is pushing them.
//!
//! Every write holds `write_lock` while it reads, persists and takes a bus
//! version, then releases it before publishing so listeners can write back
//! into the store. The version keeps concurrent publishes in storage order.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::StoreConfig,
    error::StorageError,
    reactive::change_bus::ChangeBus,
    types::{Document, Fields},
};

use super::{memory::MemoryStorage, traits::HostStorage};

pub struct LocalStore<H: HostStorage> {
    host: H,
    key_prefix: String,
    bus: Arc<ChangeBus>,
    write_lock: Mutex<()>,
}

impl LocalStore<MemoryStorage> {
    /// A store over fresh in-memory host storage with default settings.
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new(), &StoreConfig::default())
    }
}

impl<H: HostStorage> LocalStore<H> {
    pub fn new(host: H, config: &StoreConfig) -> Self {
        Self {
            host,
            key_prefix: config.key_prefix().to_string(),
            bus: Arc::new(ChangeBus::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage key for `collection`.
    pub fn key_for(&self, collection: &str) -> String {
        format!("{}{collection}", self.key_prefix)
    }

    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    // -----------------------------------------------------------------------
    // Whole-collection I/O
    // -----------------------------------------------------------------------

    /// Current contents of `collection`.
    ///
    /// Absent, unreadable or corrupt data reads as an empty collection; the
    /// problem is logged and never propagated.
    pub fn read_collection(&self, collection: &str) -> Vec<Document> {
        let key = self.key_for(collection);
        let raw = match self.host.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to read local collection, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Document>>(&raw) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "corrupt local collection, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the whole of `collection` with `docs`, then publish `docs` to
    /// every subscriber of `collection`.
    pub fn write_collection(&self, collection: &str, docs: &[Document]) -> Result<(), StorageError> {
        let version = {
            let _guard = self.write_lock.lock();
            self.persist(collection, docs)?;
            self.bus.next_version()
        };
        self.bus.publish(collection, version, docs);
        Ok(())
    }

    fn persist(&self, collection: &str, docs: &[Document]) -> Result<(), StorageError> {
        let json = serde_json::to_string(docs)?;
        self.host.set_item(&self.key_for(collection), &json)
    }

    // -----------------------------------------------------------------------
    // Per-document helpers
    // -----------------------------------------------------------------------

    /// Look up one document by id.
    pub fn get_document(&self, collection: &str, id: &str) -> Option<Document> {
        self.read_collection(collection)
            .into_iter()
            .find(|d| d.id() == Some(id))
    }

    /// Shallow-merge `doc` over the stored document with the same id, or
    /// append it. `doc` must already carry an id.
    ///
    /// Returns the document as stored.
    pub fn upsert(&self, collection: &str, doc: Document) -> Result<Document, StorageError> {
        let id = doc
            .id()
            .ok_or_else(|| StorageError::host("cannot upsert a document without an id"))?
            .to_string();

        let (docs, stored, version) = {
            let _guard = self.write_lock.lock();
            let mut docs = self.read_collection(collection);
            let stored = match docs.iter_mut().find(|d| d.id() == Some(id.as_str())) {
                Some(existing) => {
                    existing.merge(doc.fields());
                    existing.clone()
                }
                None => {
                    docs.push(doc.clone());
                    doc
                }
            };
            self.persist(collection, &docs)?;
            (docs, stored, self.bus.next_version())
        };

        self.bus.publish(collection, version, &docs);
        Ok(stored)
    }

    /// Shallow-merge `fields` into the document `id` if it exists.
    ///
    /// Never creates. Returns whether a document was updated; nothing is
    /// written or published when it was absent.
    pub fn patch(&self, collection: &str, id: &str, fields: &Fields) -> Result<bool, StorageError> {
        let (docs, version) = {
            let _guard = self.write_lock.lock();
            let mut docs = self.read_collection(collection);
            match docs.iter_mut().find(|d| d.id() == Some(id)) {
                Some(existing) => existing.merge(fields),
                None => return Ok(false),
            }
            self.persist(collection, &docs)?;
            (docs, self.bus.next_version())
        };

        self.bus.publish(collection, version, &docs);
        Ok(true)
    }

    /// Delete the document `id` if present. Returns whether one was removed;
    /// nothing is written or published when it was absent.
    pub fn remove_document(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let (docs, version) = {
            let _guard = self.write_lock.lock();
            let mut docs = self.read_collection(collection);
            let before = docs.len();
            docs.retain(|d| d.id() != Some(id));
            if docs.len() == before {
                return Ok(false);
            }
            self.persist(collection, &docs)?;
            (docs, self.bus.next_version())
        };

        self.bus.publish(collection, version, &docs);
        Ok(true)
    }

    /// Names of every collection that has been written under this prefix.
    pub fn collection_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self
            .host
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.key_prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}
