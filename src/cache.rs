//! Local conversation cache
//!
//! Conversations are stored as one JSON document per user in a SQLite
//! key/value table. The cache is best-effort: failures are logged and the
//! session carries on without it.

use crate::runtime::LocalCache;
use crate::session::Conversation;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cache lock poisoned")]
    Poisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache key holding a user's conversation list
pub fn chats_key(user_id: &str) -> String {
    format!("chats_{user_id}")
}

/// Read a user's cached conversations; missing or unreadable entries yield none
pub fn load_conversations<C: LocalCache + ?Sized>(cache: &C, user_id: &str) -> Vec<Conversation> {
    let key = chats_key(user_id);
    let raw = match cache.get(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Cache read failed");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(conversations) => conversations,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
            Vec::new()
        }
    }
}

/// Overwrite a user's cached conversations, logging and dropping failures
pub fn store_conversations<C: LocalCache + ?Sized>(
    cache: &C,
    user_id: &str,
    conversations: &[Conversation],
) {
    let key = chats_key(user_id);
    let result = serde_json::to_string(conversations)
        .map_err(CacheError::from)
        .and_then(|json| cache.set(&key, &json));

    match result {
        Ok(()) => tracing::debug!(key = %key, count = conversations.len(), "Cached conversations"),
        Err(e) => tracing::warn!(key = %key, error = %e, "Cache write failed"),
    }
}

/// Thread-safe SQLite-backed cache handle
#[derive(Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Open or create the cache at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory cache
    #[cfg(test)]
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}

impl LocalCache for SqliteCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
