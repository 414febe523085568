//! Injectable storage backends for the freshness cache.
//!
//! The cache never lets a backend failure reach its callers; everything in
//! here returns [`StoreError`] and the cache degrades to a miss.

use std::sync::Mutex;

use dashmap::DashMap;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

use super::CacheEntry;
use crate::models::AssetRecord;

/// Errors from a cache storage backend. Never propagated past the cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend itself failed (connection, I/O, poisoned lock).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// A key/value snapshot store used as the durable cache tier.
pub trait CacheStore: Send + Sync {
    /// Load the entry stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Persist `entry` under `key`.
    ///
    /// Implementations must never replace a newer entry with an older one:
    /// a save whose `stored_at` is behind the stored entry is a no-op.
    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError>;
}

/// In-memory store. Useful as a durable-tier stand-in for tests and for
/// hosts without a writable filesystem.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                if entry.stored_at >= existing.get().stored_at {
                    existing.insert(entry.clone());
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry.clone());
            }
        }
        Ok(())
    }
}

/// SQLite-backed durable store.
///
/// One row per cache key; payloads are JSON-serialized record lists and
/// `stored_at` is RFC 3339 so string comparison orders chronologically.
/// The upsert is guarded by `stored_at` (compare-and-swap) so a delayed
/// writer cannot clobber a newer snapshot.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a transient in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS market_snapshots (
                key       TEXT PRIMARY KEY,
                payload   TEXT NOT NULL,
                stored_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(format!("connection lock poisoned: {}", e)))
    }
}

impl CacheStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, stored_at FROM market_snapshots WHERE key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, stored_at)) = row else {
            return Ok(None);
        };

        let records: Vec<AssetRecord> = serde_json::from_str(&payload)?;
        let stored_at = stored_at
            .parse()
            .map_err(|e| StoreError::Serialization(format!("bad stored_at timestamp: {}", e)))?;

        Ok(Some(CacheEntry {
            payload: records,
            stored_at,
        }))
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&entry.payload)?;
        let stored_at = entry.stored_at.to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO market_snapshots (key, payload, stored_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 stored_at = excluded.stored_at
             WHERE excluded.stored_at >= market_snapshots.stored_at",
            rusqlite::params![key, payload, stored_at],
        )?;
        Ok(())
    }
}
