//! SQLite-backed cache store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{BucketStats, CacheBucket, CacheEntry, CacheError, CacheStore};

/// SQLite-backed key/value store, one table keyed by `(bucket, cache_key)`.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                bucket TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (bucket, cache_key)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_stored_at ON cache_entries(stored_at);
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Database("cache connection lock poisoned".to_string()))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, bucket: CacheBucket, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, stored_at FROM cache_entries WHERE bucket = ? AND cache_key = ?",
                params![bucket.as_str(), key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(row.map(|(payload, stored_at)| CacheEntry {
            bucket,
            key: key.to_string(),
            payload,
            // An unreadable timestamp is treated as ancient so the entry gets refetched.
            stored_at: parse_timestamp(&stored_at).unwrap_or(DateTime::<Utc>::MIN_UTC),
        }))
    }

    fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO cache_entries (bucket, cache_key, payload, stored_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(bucket, cache_key) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at
            "#,
            params![
                entry.bucket.as_str(),
                entry.key,
                entry.payload,
                entry.stored_at.to_rfc3339()
            ],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn clear_bucket(&self, bucket: CacheBucket) -> Result<u64, CacheError> {
        let conn = self.conn()?;

        let removed = conn
            .execute(
                "DELETE FROM cache_entries WHERE bucket = ?",
                params![bucket.as_str()],
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(removed as u64)
    }

    fn stats(&self, bucket: CacheBucket) -> Result<BucketStats, CacheError> {
        let conn = self.conn()?;

        let (entries, oldest, newest): (u64, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), MIN(stored_at), MAX(stored_at) FROM cache_entries WHERE bucket = ?",
                params![bucket.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(BucketStats {
            bucket,
            entries,
            oldest_entry: oldest.as_deref().and_then(parse_timestamp),
            newest_entry: newest.as_deref().and_then(parse_timestamp),
        })
    }
}
