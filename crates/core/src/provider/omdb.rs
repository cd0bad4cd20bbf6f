//! OMDB (Open Movie Database) API client.
//!
//! OMDB answers HTTP 200 for most failures and reports them in the body
//! (`"Response": "False"`). An exhausted daily quota shows up as the error
//! message "Request limit reached!", which trips the provider breaker.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{HttpClient, OmdbRecord, ProviderError};
use crate::cache::{id_key, normalize_key, CacheBucket, Cached, PersistentCache};

pub const DEFAULT_BASE_URL: &str = "http://www.omdbapi.com";

/// OMDB API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmdbConfig {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_requests_per_second() -> u32 {
    1
}

fn is_limit_message(message: &str) -> bool {
    message.contains("Request limit reached")
}

/// OMDB API client.
pub struct OmdbClient {
    http: HttpClient,
    cache: PersistentCache,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(
        config: &OmdbConfig,
        http: HttpClient,
        cache: PersistentCache,
    ) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "OMDB API key is required".to_string(),
            ));
        }

        Ok(Self {
            http,
            cache,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub async fn fetch_by_imdb_id(&self, imdb_id: &str) -> Result<Option<OmdbRecord>, ProviderError> {
        debug!(imdb_id, "OMDB lookup by IMDb ID");
        self.request(vec![("i", imdb_id.to_string()), ("plot", "full".to_string())])
            .await
    }

    pub async fn fetch_by_title(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<OmdbRecord>, ProviderError> {
        debug!(title, ?year, "OMDB lookup by title");
        let mut params = vec![("t", title.to_string()), ("plot", "full".to_string())];
        if let Some(year) = year {
            params.push(("y", year.to_string()));
        }
        self.request(params).await
    }

    /// Misses are not cached.
    pub async fn cached_fetch_by_imdb_id(
        &self,
        imdb_id: &str,
    ) -> Result<Cached<Option<OmdbRecord>>, ProviderError> {
        let key = imdb_key(imdb_id);
        self.cache
            .get_or_fetch_with_policy(
                CacheBucket::Omdb,
                &key,
                || self.fetch_by_imdb_id(imdb_id.trim()),
                |record: &Option<OmdbRecord>| record.is_some(),
            )
            .await
    }

    /// Title lookups also seed the IMDb-ID entry so a later lookup by ID is a
    /// cache hit.
    pub async fn cached_fetch_by_title(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Cached<Option<OmdbRecord>>, ProviderError> {
        let key = format!("title_{}_{}", normalize_key(title), year.unwrap_or(0));
        let cached = self
            .cache
            .get_or_fetch_with_policy(
                CacheBucket::Omdb,
                &key,
                || self.fetch_by_title(title, year),
                |record: &Option<OmdbRecord>| record.is_some(),
            )
            .await?;

        if !cached.from_cache {
            if let Some(imdb_id) = cached.value.as_ref().and_then(OmdbRecord::imdb_id) {
                if let Err(e) = self.cache.store(CacheBucket::Omdb, &imdb_key(imdb_id), &cached.value) {
                    debug!(imdb_id, error = %e, "Failed to seed OMDB cache by IMDb ID");
                }
            }
        }

        Ok(cached)
    }

    /// Look up by IMDb ID when one is known, by title otherwise.
    pub async fn lookup(
        &self,
        imdb_id: Option<&str>,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<OmdbRecord>, ProviderError> {
        let cached = match imdb_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(imdb_id) => self.cached_fetch_by_imdb_id(imdb_id).await?,
            None => self.cached_fetch_by_title(title, year).await?,
        };
        Ok(cached.value)
    }

    async fn request(
        &self,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<Option<OmdbRecord>, ProviderError> {
        params.push(("apikey", self.api_key.clone()));

        let body: Value = match self.http.get_json(&self.base_url, &params).await {
            Ok(body) => body,
            Err(ProviderError::Api { message, .. }) if is_limit_message(&message) => {
                return Err(self.limit_reached());
            }
            Err(e) => return Err(e),
        };

        if body.get("Response").and_then(Value::as_str) == Some("False") {
            let message = body
                .get("Error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();

            if is_limit_message(&message) {
                return Err(self.limit_reached());
            }
            if message.to_ascii_lowercase().contains("not found") {
                debug!(%message, "OMDB has no match");
                return Ok(None);
            }
            return Err(ProviderError::Api {
                provider: self.http.provider(),
                status: 200,
                message,
            });
        }

        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| ProviderError::Parse(format!("OMDB record: {}", e)))
    }

    fn limit_reached(&self) -> ProviderError {
        self.http.breaker().trip();
        ProviderError::rate_limited(self.http.provider())
    }
}

fn imdb_key(imdb_id: &str) -> String {
    id_key("imdb", imdb_id.trim().to_ascii_lowercase())
}
