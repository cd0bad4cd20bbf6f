//! Persistent response cache.
//!
//! Provider responses are serialized to JSON and stored per bucket with a
//! timestamp. Entries older than the TTL are ignored on read and replaced on
//! the next successful fetch. Storage or decode failures never fail a lookup:
//! they are logged and treated as a miss.

mod key;
mod persistent;
mod sqlite;
mod types;

pub use key::{id_key, normalize_key, search_key};
pub use persistent::{PersistentCache, DEFAULT_TTL};
pub use sqlite::SqliteCacheStore;
pub use types::*;

/// Trait for cache storage backends.
pub trait CacheStore: Send + Sync {
    /// Fetch the entry for `(bucket, key)` regardless of its age.
    fn get(&self, bucket: CacheBucket, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or replace an entry.
    fn put(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Remove every entry in a bucket. Returns the number removed.
    fn clear_bucket(&self, bucket: CacheBucket) -> Result<u64, CacheError>;

    fn stats(&self, bucket: CacheBucket) -> Result<BucketStats, CacheError>;
}
