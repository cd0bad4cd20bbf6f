//! Types for the persistent response cache.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical cache namespace, one per provider endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBucket {
    Omdb,
    Tmdb,
    SteamSearch,
    Steam,
}

impl CacheBucket {
    pub const ALL: [CacheBucket; 4] = [
        CacheBucket::Omdb,
        CacheBucket::Tmdb,
        CacheBucket::SteamSearch,
        CacheBucket::Steam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBucket::Omdb => "omdb",
            CacheBucket::Tmdb => "tmdb",
            CacheBucket::SteamSearch => "steam_search",
            CacheBucket::Steam => "steam",
        }
    }
}

impl fmt::Display for CacheBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheBucket {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        CacheBucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == wanted)
            .ok_or_else(|| CacheError::UnknownBucket(s.to_string()))
    }
}

/// One stored payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub bucket: CacheBucket,
    pub key: String,
    /// Serialized JSON payload.
    pub payload: String,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(bucket: CacheBucket, key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            bucket,
            key: key.into(),
            payload: payload.into(),
            stored_at: Utc::now(),
        }
    }

    /// Expired when strictly older than `ttl`. Timestamps in the future count
    /// as age zero.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = (now - self.stored_at).to_std().unwrap_or_default();
        age > ttl
    }
}

/// Per-bucket statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BucketStats {
    pub bucket: CacheBucket,
    pub entries: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// A value together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub from_cache: bool,
}

impl<T> Cached<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            from_cache: false,
        }
    }

    pub fn hit(value: T) -> Self {
        Self {
            value,
            from_cache: true,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        Cached {
            value: f(self.value),
            from_cache: self.from_cache,
        }
    }
}

/// Errors for cache storage operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown cache bucket: {0}")]
    UnknownBucket(String),
}
