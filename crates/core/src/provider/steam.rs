//! Steam storefront client (store search and app details).
//!
//! The storefront API needs no key. Search results carry no vote data, so
//! candidates come back with `vote_count == 0`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{HttpClient, MediaType, ProviderError, SearchCandidate, SteamAppDetails};
use crate::cache::{id_key, normalize_key, CacheBucket, Cached, PersistentCache};

pub const DEFAULT_STORE_URL: &str = "https://store.steampowered.com";

/// Steam storefront configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteamConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_search_limit() -> usize {
    10
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            requests_per_second: default_requests_per_second(),
            search_limit: default_search_limit(),
        }
    }
}

/// Steam storefront client.
pub struct SteamClient {
    http: HttpClient,
    cache: PersistentCache,
    store_url: String,
}

impl SteamClient {
    pub fn new(config: &SteamConfig, http: HttpClient, cache: PersistentCache) -> Self {
        let store_url = config
            .store_url
            .clone()
            .unwrap_or_else(|| DEFAULT_STORE_URL.to_string());

        Self {
            http,
            cache,
            store_url: store_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub async fn search(&self, term: &str) -> Result<Vec<SearchCandidate>, ProviderError> {
        debug!(term, "Steam store search");

        let response: SteamSearchResponse = self.http.get_json(&self.build_search_url(term), &[]).await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| {
                let mut candidate = SearchCandidate::new(item.id, MediaType::Game, item.name);
                candidate.image = item.tiny_image.filter(|url| !url.is_empty());
                candidate
            })
            .collect())
    }

    fn build_search_url(&self, term: &str) -> String {
        format!(
            "{}/api/storesearch/?term={}&l=english&cc=US",
            self.store_url,
            urlencoding::encode(term.trim())
        )
    }

    /// `None` when Steam reports the app as unavailable.
    pub async fn app_details(&self, app_id: u64) -> Result<Option<SteamAppDetails>, ProviderError> {
        debug!(app_id, "Steam app details");

        let params = [("appids", app_id.to_string()), ("l", "english".to_string())];
        let body: Value = self
            .http
            .get_json(&format!("{}/api/appdetails", self.store_url), &params)
            .await?;

        let entry = match body.get(app_id.to_string()) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if !entry.get("success").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(None);
        }

        let data = entry
            .get("data")
            .ok_or_else(|| ProviderError::Parse(format!("Steam app {} has no data", app_id)))?;

        Ok(Some(details_from_data(app_id, data)))
    }

    /// Empty result lists are not cached.
    pub async fn cached_search(&self, term: &str) -> Result<Cached<Vec<SearchCandidate>>, ProviderError> {
        let key = normalize_key(term);
        self.cache
            .get_or_fetch_with_policy(
                CacheBucket::SteamSearch,
                &key,
                || self.search(term),
                |results: &Vec<SearchCandidate>| !results.is_empty(),
            )
            .await
    }

    pub async fn cached_app_details(
        &self,
        app_id: u64,
        force: bool,
    ) -> Result<Cached<Option<SteamAppDetails>>, ProviderError> {
        let key = id_key("app", app_id);
        if force {
            return self
                .cache
                .refresh(CacheBucket::Steam, &key, || self.app_details(app_id))
                .await
                .map(Cached::fresh);
        }

        self.cache
            .get_or_fetch_with_policy(
                CacheBucket::Steam,
                &key,
                || self.app_details(app_id),
                |details: &Option<SteamAppDetails>| details.is_some(),
            )
            .await
    }
}

fn string_list(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn details_from_data(app_id: u64, data: &Value) -> SteamAppDetails {
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    SteamAppDetails {
        app_id,
        name: text("name").unwrap_or_default(),
        short_description: text("short_description"),
        header_image: text("header_image"),
        release_date: data
            .get("release_date")
            .and_then(|r| r.get("date"))
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        developers: string_list(data, "developers"),
        publishers: string_list(data, "publishers"),
        genres: data
            .get("genres")
            .and_then(Value::as_array)
            .map(|genres| {
                genres
                    .iter()
                    .filter_map(|g| g.get("description").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        metacritic_score: data
            .get("metacritic")
            .and_then(|m| m.get("score"))
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s).ok()),
    }
}

// =============================================================================
// Steam API Response Types (internal)
// =============================================================================

#[derive(Debug, Deserialize)]
struct SteamSearchResponse {
    #[serde(default)]
    items: Vec<SteamSearchItem>,
}

#[derive(Debug, Deserialize)]
struct SteamSearchItem {
    id: u64,
    name: String,
    tiny_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::cache::{SqliteCacheStore, DEFAULT_TTL};
    use crate::provider::{Provider, RetryPolicy};
    use crate::ratelimit::RateLimitBreaker;

    fn create_client(server: &MockServer) -> SteamClient {
        let http = HttpClient::new(
            Provider::Steam,
            Duration::from_secs(5),
            100,
            Arc::new(RateLimitBreaker::new(Provider::Steam)),
            RetryPolicy::default(),
        )
        .unwrap();
        let cache = PersistentCache::new(
            Arc::new(SqliteCacheStore::in_memory().unwrap()),
            DEFAULT_TTL,
        );
        let config = SteamConfig {
            store_url: Some(server.uri()),
            ..SteamConfig::default()
        };
        SteamClient::new(&config, http, cache)
    }

    #[tokio::test]
    async fn test_search_maps_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/storesearch/"))
            .and(query_param("term", "Portal 2"))
            .and(query_param("cc", "US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 2,
                "items": [
                    {"id": 620, "name": "Portal 2", "tiny_image": "https://cdn.example/620.jpg"},
                    {"id": 400, "name": "Portal", "tiny_image": ""}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_client(&server);
        let results = client.cached_search("Portal 2").await.unwrap();
        assert_eq!(results.value.len(), 2);
        assert_eq!(results.value[0].media_type, MediaType::Game);
        assert_eq!(results.value[0].image.as_deref(), Some("https://cdn.example/620.jpg"));
        assert_eq!(results.value[1].image, None);

        assert!(client.cached_search("portal 2").await.unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_empty_search_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/storesearch/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "items": []})))
            .expect(2)
            .mount(&server)
            .await;

        let client = create_client(&server);
        assert!(client.cached_search("zzzz").await.unwrap().value.is_empty());
        assert!(!client.cached_search("zzzz").await.unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_app_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/appdetails"))
            .and(query_param("appids", "620"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "620": {
                    "success": true,
                    "data": {
                        "name": "Portal 2",
                        "short_description": "The sequel.",
                        "header_image": "https://cdn.example/620/header.jpg",
                        "release_date": {"coming_soon": false, "date": "18 Apr, 2011"},
                        "developers": ["Valve"],
                        "publishers": ["Valve"],
                        "genres": [{"id": "1", "description": "Action"}, {"id": "25", "description": "Adventure"}],
                        "metacritic": {"score": 95}
                    }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/appdetails"))
            .and(query_param("appids", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"1": {"success": false}})))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let details = client.cached_app_details(620, false).await.unwrap().value.unwrap();
        assert_eq!(details.name, "Portal 2");
        assert_eq!(details.genres, vec!["Action", "Adventure"]);
        assert_eq!(details.metacritic_score, Some(95));
        assert_eq!(details.release_date.as_deref(), Some("18 Apr, 2011"));

        assert!(client.cached_app_details(1, false).await.unwrap().value.is_none());
    }
}
