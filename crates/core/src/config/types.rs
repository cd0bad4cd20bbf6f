use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cover::CoverOptions;
use crate::provider::{OmdbConfig, RetryPolicy, SteamConfig, TmdbConfig};
use crate::resolver::ResolverOptions;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub tmdb: Option<TmdbConfig>,
    #[serde(default)]
    pub omdb: Option<OmdbConfig>,
    #[serde(default)]
    pub steam: Option<SteamConfig>,
    #[serde(default)]
    pub covers: CoversConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// Persistent response cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// One TTL for every bucket.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache.db")
}

fn default_ttl_hours() -> u64 {
    720
}

/// Shared HTTP settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

/// Cover download and placement
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoversConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Keep resized covers in a development cache. Without an explicit
    /// `cache_dir` the cache lives in `covers/` next to the response cache.
    #[serde(default)]
    pub use_cache: bool,
    /// Development cache of resized covers, keyed by provider ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub update_existing: bool,
    /// Where cover files are written.
    #[serde(default = "default_attachments_dir")]
    pub attachments_dir: PathBuf,
    /// Directory of the notes; cover links are made relative to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_dir: Option<PathBuf>,
}

impl CoversConfig {
    pub fn options(&self) -> CoverOptions {
        CoverOptions {
            max_width: self.max_width,
            jpeg_quality: self.jpeg_quality,
            cache_dir: self.cache_dir.clone(),
            update_existing: self.update_existing,
        }
    }
}

impl Default for CoversConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            jpeg_quality: default_jpeg_quality(),
            use_cache: false,
            cache_dir: None,
            update_existing: false,
            attachments_dir: default_attachments_dir(),
            note_dir: None,
        }
    }
}

fn default_max_width() -> u32 {
    1000
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_attachments_dir() -> PathBuf {
    PathBuf::from("attachments")
}

/// Run switches for enrichment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Ask a human when the match is ambiguous.
    #[serde(default)]
    pub interactive: bool,
    /// Ignore stored IDs and resolve again.
    #[serde(default)]
    pub force: bool,
    /// Bypass the cache for metadata and details.
    #[serde(default)]
    pub refresh_cache: bool,
    /// Restrict TMDB searches to movies.
    #[serde(default)]
    pub movies_only: bool,
    #[serde(default = "default_true")]
    pub tmdb_enabled: bool,
    #[serde(default = "default_true")]
    pub download_covers: bool,
    /// Deadline per record, including interactive prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_timeout_secs: Option<u64>,
}

impl EnrichmentConfig {
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }

    /// Resolver options; vote threshold and search limit come from the
    /// provider section.
    pub fn resolver_options(&self, min_vote_count: u32, search_limit: usize) -> ResolverOptions {
        ResolverOptions {
            interactive: self.interactive,
            force: self.force,
            min_vote_count,
            search_limit,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            interactive: false,
            force: false,
            refresh_cache: false,
            movies_only: false,
            tmdb_enabled: true,
            download_covers: true,
            item_timeout_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub cache: CacheConfig,
    pub http: HttpConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<SanitizedTmdbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omdb: Option<SanitizedOmdbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steam: Option<SteamConfig>,
    pub covers: CoversConfig,
    pub enrichment: EnrichmentConfig,
}

/// Sanitized TMDB config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTmdbConfig {
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub requests_per_second: u32,
    pub min_vote_count: u32,
    pub search_limit: usize,
}

/// Sanitized OMDB config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOmdbConfig {
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub requests_per_second: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            cache: config.cache.clone(),
            http: config.http.clone(),
            tmdb: config.tmdb.as_ref().map(|t| SanitizedTmdbConfig {
                api_key_configured: !t.api_key.is_empty(),
                base_url: t.base_url.clone(),
                requests_per_second: t.requests_per_second,
                min_vote_count: t.min_vote_count,
                search_limit: t.search_limit,
            }),
            omdb: config.omdb.as_ref().map(|o| SanitizedOmdbConfig {
                api_key_configured: !o.api_key.is_empty(),
                base_url: o.base_url.clone(),
                requests_per_second: o.requests_per_second,
            }),
            steam: config.steam.clone(),
            covers: config.covers.clone(),
            enrichment: config.enrichment.clone(),
        }
    }
}
