//! Read-through cache with TTL and a persistence policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{BucketStats, CacheBucket, CacheEntry, CacheError, CacheStore, Cached};

/// Default time-to-live: 30 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(720 * 3600);

/// Typed read-through cache over a [`CacheStore`].
#[derive(Clone)]
pub struct PersistentCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl PersistentCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the fresh cached value for `key`, or run `fetch` and store its
    /// result.
    ///
    /// Errors from `fetch` are returned unchanged and nothing is stored.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        bucket: CacheBucket,
        key: &str,
        fetch: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_fetch_with_policy(bucket, key, fetch, |_| true)
            .await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but a fetched value is
    /// only stored when `should_persist` accepts it. Rejected values are
    /// still returned to the caller.
    pub async fn get_or_fetch_with_policy<T, E, F, Fut, P>(
        &self,
        bucket: CacheBucket,
        key: &str,
        fetch: F,
        should_persist: P,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&T) -> bool,
    {
        if let Some(value) = self.lookup(bucket, key) {
            debug!(bucket = %bucket, key, "Cache hit");
            return Ok(Cached::hit(value));
        }

        debug!(bucket = %bucket, key, "Cache miss, fetching");
        let value = fetch().await?;

        if should_persist(&value) {
            self.store_logged(bucket, key, &value);
        } else {
            debug!(bucket = %bucket, key, "Skipping cache store for rejected value");
        }

        Ok(Cached::fresh(value))
    }

    /// Fetch unconditionally and overwrite whatever is stored.
    pub async fn refresh<T, E, F, Fut>(&self, bucket: CacheBucket, key: &str, fetch: F) -> Result<T, E>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug!(bucket = %bucket, key, "Refreshing cache entry");
        let value = fetch().await?;
        self.store_logged(bucket, key, &value);
        Ok(value)
    }

    /// `get_or_fetch`, or `refresh` when `force` is set.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        bucket: CacheBucket,
        key: &str,
        force: bool,
        fetch: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if force {
            self.refresh(bucket, key, fetch).await.map(Cached::fresh)
        } else {
            self.get_or_fetch(bucket, key, fetch).await
        }
    }

    /// Read a fresh entry. Missing, expired, unreadable and undecodable
    /// entries all return `None`.
    pub fn lookup<T: DeserializeOwned>(&self, bucket: CacheBucket, key: &str) -> Option<T> {
        let entry = match self.store.get(bucket, key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(bucket = %bucket, key, error = %e, "Cache read failed");
                return None;
            }
        };

        if entry.is_expired(self.ttl, Utc::now()) {
            debug!(bucket = %bucket, key, stored_at = %entry.stored_at, "Cache entry expired");
            return None;
        }

        match serde_json::from_str(&entry.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(bucket = %bucket, key, error = %e, "Failed to decode cached payload, refetching");
                None
            }
        }
    }

    /// Serialize and store a value.
    pub fn store<T: Serialize>(&self, bucket: CacheBucket, key: &str, value: &T) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.store.put(&CacheEntry::new(bucket, key, payload))
    }

    fn store_logged<T: Serialize>(&self, bucket: CacheBucket, key: &str, value: &T) {
        if let Err(e) = self.store(bucket, key, value) {
            warn!(bucket = %bucket, key, error = %e, "Failed to write cache entry");
        }
    }

    pub fn clear_bucket(&self, bucket: CacheBucket) -> Result<u64, CacheError> {
        let removed = self.store.clear_bucket(bucket)?;
        debug!(bucket = %bucket, removed, "Cleared cache bucket");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<Vec<BucketStats>, CacheError> {
        CacheBucket::ALL
            .into_iter()
            .map(|bucket| self.store.stats(bucket))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteCacheStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_cache(ttl: Duration) -> (PersistentCache, Arc<SqliteCacheStore>) {
        let store = Arc::new(SqliteCacheStore::in_memory().unwrap());
        let cache = PersistentCache::new(store.clone(), ttl);
        (cache, store)
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let (cache, _) = create_test_cache(DEFAULT_TTL);
        let calls = AtomicUsize::new(0);

        for expected_hit in [false, true] {
            let result: Cached<Vec<String>> = cache
                .get_or_fetch(CacheBucket::Tmdb, "search_matrix_1999_10", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec!["The Matrix".to_string()])
                })
                .await
                .unwrap();

            assert_eq!(result.value, vec!["The Matrix".to_string()]);
            assert_eq!(result.from_cache, expected_hit);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_passes_through_and_stores_nothing() {
        let (cache, store) = create_test_cache(DEFAULT_TTL);

        let err = cache
            .get_or_fetch(CacheBucket::Omdb, "tt1", || async {
                Err::<String, _>("upstream down".to_string())
            })
            .await
            .unwrap_err();

        assert_eq!(err, "upstream down");
        assert!(store.get(CacheBucket::Omdb, "tt1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_value_is_returned_but_not_stored() {
        let (cache, _) = create_test_cache(DEFAULT_TTL);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_fetch_with_policy(
                    CacheBucket::SteamSearch,
                    "hades",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<Vec<u64>, String>(Vec::new())
                    },
                    |items: &Vec<u64>| !items.is_empty(),
                )
                .await
                .unwrap();
            assert!(result.value.is_empty());
            assert!(!result.from_cache);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched_and_replaced() {
        let ttl = Duration::from_secs(3600);
        let (cache, store) = create_test_cache(ttl);

        let mut stale = CacheEntry::new(CacheBucket::Tmdb, "movie_full_1", "\"stale\"");
        stale.stored_at = Utc::now() - chrono::Duration::hours(2);
        store.put(&stale).unwrap();

        let result = cache
            .get_or_fetch(CacheBucket::Tmdb, "movie_full_1", || async {
                Ok::<_, String>("fresh".to_string())
            })
            .await
            .unwrap();

        assert_eq!(result.value, "fresh");
        assert!(!result.from_cache);

        let stored = store.get(CacheBucket::Tmdb, "movie_full_1").unwrap().unwrap();
        assert_eq!(stored.payload, "\"fresh\"");
        assert!(stored.stored_at > stale.stored_at);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_a_miss() {
        let (cache, store) = create_test_cache(DEFAULT_TTL);
        store
            .put(&CacheEntry::new(CacheBucket::Omdb, "tt2", "not json"))
            .unwrap();

        let result = cache
            .get_or_fetch(CacheBucket::Omdb, "tt2", || async { Ok::<_, String>(42u32) })
            .await
            .unwrap();

        assert_eq!(result.value, 42);
        assert!(!result.from_cache);
        assert_eq!(cache.lookup::<u32>(CacheBucket::Omdb, "tt2"), Some(42));
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites_fresh_entry() {
        let (cache, _) = create_test_cache(DEFAULT_TTL);
        cache.store(CacheBucket::Steam, "app_10", &"old").unwrap();

        let result = cache
            .fetch(CacheBucket::Steam, "app_10", true, || async {
                Ok::<_, String>("new".to_string())
            })
            .await
            .unwrap();
        assert_eq!(result.value, "new");
        assert!(!result.from_cache);

        let again = cache
            .fetch(CacheBucket::Steam, "app_10", false, || async {
                Ok::<_, String>("unused".to_string())
            })
            .await
            .unwrap();
        assert_eq!(again.value, "new");
        assert!(again.from_cache);
    }

    #[tokio::test]
    async fn test_clear_bucket_and_stats() {
        let (cache, _) = create_test_cache(DEFAULT_TTL);
        cache.store(CacheBucket::Tmdb, "a", &1).unwrap();
        cache.store(CacheBucket::Tmdb, "b", &2).unwrap();
        cache.store(CacheBucket::Omdb, "c", &3).unwrap();

        assert_eq!(cache.clear_bucket(CacheBucket::Tmdb).unwrap(), 2);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.len(), CacheBucket::ALL.len());
        let omdb = stats.iter().find(|s| s.bucket == CacheBucket::Omdb).unwrap();
        assert_eq!(omdb.entries, 1);
        let tmdb = stats.iter().find(|s| s.bucket == CacheBucket::Tmdb).unwrap();
        assert_eq!(tmdb.entries, 0);
    }
}
