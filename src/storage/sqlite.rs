//! SQLite host storage for class-store.
//!
//! Implements `HostStorage` as a single key-value table using rusqlite
//! (bundled). The connection sits behind a `parking_lot::Mutex`; every call is
//! one short statement so the lock is never held across user code.

use parking_lot::Mutex;
use rusqlite::{params, ErrorCode, OptionalExtension};

use crate::error::StorageError;

use super::traits::HostStorage;

/// Map a rusqlite error to a `StorageError`. A full disk becomes
/// `QuotaExceeded` so callers can tell the user their device storage is full.
fn storage_err(e: rusqlite::Error, key: &str, needed: usize) -> StorageError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => StorageError::QuotaExceeded {
            key: key.to_string(),
            needed,
            limit: None,
        },
        _ => StorageError::Host {
            message: e.to_string(),
            source: Some(Box::new(e)),
        },
    }
}

fn open_err(e: rusqlite::Error) -> StorageError {
    StorageError::Host {
        message: format!("failed to open SQLite storage: {e}"),
        source: Some(Box::new(e)),
    }
}

/// File-backed (or in-memory) SQLite key-value storage.
pub struct SqliteStorage {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStorage {
    /// Open (creating if needed) a file-backed database.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let conn = rusqlite::Connection::open(path).map_err(open_err)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(open_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS kv (
                 key   TEXT PRIMARY KEY NOT NULL,
                 value TEXT NOT NULL
             );",
        )
        .map_err(open_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl HostStorage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| storage_err(e, key, 0))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
            .map_err(|e| storage_err(e, key, key.len() + value.len()))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map(|_| ())
            .map_err(|e| storage_err(e, key, 0))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT key FROM kv")
            .map_err(|e| storage_err(e, "", 0))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| storage_err(e, "", 0))?;
        let keys = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| storage_err(e, "", 0))?;
        Ok(keys)
    }
}
