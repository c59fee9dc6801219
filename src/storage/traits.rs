//! Host storage trait for class-store.
//!
//! `HostStorage` is the narrow synchronous key-value interface the local store
//! persists into (browser-style local storage, a SQLite file, an in-memory map).
//! It knows nothing about collections or documents; `LocalStore` layers those
//! on top.

use crate::error::StorageError;

/// Synchronous string key-value storage.
///
/// Implementors must be `Send + Sync` so a single store can be shared by every
/// facade and subscription in the process.
pub trait HostStorage: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value under `key`.
    ///
    /// Returns `StorageError::QuotaExceeded` when the host has no room left.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<H: HostStorage + ?Sized> HostStorage for std::sync::Arc<H> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}
