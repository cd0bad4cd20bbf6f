//! TMDB (The Movie Database) API client.
//!
//! Search endpoints, IMDb ID lookup, full details and type metadata. Every
//! endpoint has a `cached_*` counterpart backed by the `tmdb` cache bucket.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{HttpClient, MediaType, Provider, ProviderError, SearchCandidate, TmdbMetadata};
use crate::cache::{id_key, search_key, CacheBucket, Cached, PersistentCache};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/original";

/// TMDB API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    /// TMDB API key (required).
    pub api_key: String,
    /// Base URL (default: https://api.themoviedb.org/3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Image base URL for posters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base_url: Option<String>,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Candidates below this vote count are dropped unless they have the
    /// expected media type.
    #[serde(default = "default_min_vote_count")]
    pub min_vote_count: u32,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_requests_per_second() -> u32 {
    4
}

fn default_min_vote_count() -> u32 {
    100
}

fn default_search_limit() -> usize {
    10
}

/// Which TMDB endpoint produced an ID found through `/find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindHit {
    pub tmdb_id: u64,
    pub media_type: MediaType,
}

/// TMDB API client.
pub struct TmdbClient {
    http: HttpClient,
    cache: PersistentCache,
    base_url: String,
    api_key: String,
    image_base_url: String,
}

impl TmdbClient {
    pub fn new(
        config: &TmdbConfig,
        http: HttpClient,
        cache: PersistentCache,
    ) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "TMDB API key is required".to_string(),
            ));
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let image_base_url = config
            .image_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string());

        Ok(Self {
            http,
            cache,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    // =========================================================================
    // Raw endpoints
    // =========================================================================

    /// Multi search (movies and TV). Results with no votes at all and people
    /// are dropped.
    pub async fn search_multi(
        &self,
        query: &str,
        year: Option<i32>,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, ProviderError> {
        debug!(query, ?year, "TMDB multi search");

        let mut params = self.params(&[("query", query.to_string())]);
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }

        let response: TmdbSearchResponse = self
            .http
            .get_json(&format!("{}/search/multi", self.base_url), &params)
            .await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|item| {
                let media_type = match item.media_type.as_deref() {
                    Some("movie") => MediaType::Movie,
                    Some("tv") => MediaType::Tv,
                    _ => return None,
                };
                item.into_candidate(media_type)
            })
            .take(limit)
            .collect())
    }

    /// Movie-only search.
    pub async fn search_movies(
        &self,
        query: &str,
        year: Option<i32>,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, ProviderError> {
        debug!(query, ?year, "TMDB movie search");

        let mut params = self.params(&[("query", query.to_string())]);
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }

        let response: TmdbSearchResponse = self
            .http
            .get_json(&format!("{}/search/movie", self.base_url), &params)
            .await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|item| item.into_candidate(MediaType::Movie))
            .take(limit)
            .collect())
    }

    /// Resolve an IMDb ID. Movie results win over TV results.
    pub async fn find_by_imdb_id(&self, imdb_id: &str) -> Result<Option<FindHit>, ProviderError> {
        debug!(imdb_id, "TMDB find by IMDb ID");

        let params = self.params(&[("external_source", "imdb_id".to_string())]);
        let response: TmdbFindResponse = self
            .http
            .get_json(&format!("{}/find/{}", self.base_url, imdb_id), &params)
            .await?;

        let hit = response
            .movie_results
            .first()
            .map(|r| FindHit {
                tmdb_id: r.id,
                media_type: MediaType::Movie,
            })
            .or_else(|| {
                response.tv_results.first().map(|r| FindHit {
                    tmdb_id: r.id,
                    media_type: MediaType::Tv,
                })
            });

        Ok(hit)
    }

    /// Full details document, with external IDs and keywords appended.
    pub async fn full_details(&self, id: u64, media_type: MediaType) -> Result<Value, ProviderError> {
        let segment = endpoint_segment(media_type)?;
        let append = match media_type {
            MediaType::Tv => "external_ids,keywords,content_ratings",
            _ => "external_ids,keywords",
        };

        let params = self.params(&[("append_to_response", append.to_string())]);
        let url = format!("{}/{}/{}", self.base_url, segment, id);

        match self.http.get_json(&url, &params).await {
            Err(ProviderError::Api { status: 404, .. }) => {
                Err(ProviderError::NotFound(format!("TMDB {} {}", media_type, id)))
            }
            other => other,
        }
    }

    pub async fn metadata(&self, id: u64, media_type: MediaType) -> Result<TmdbMetadata, ProviderError> {
        let details = self.full_details(id, media_type).await?;
        Ok(metadata_from_details(id, media_type, &details))
    }

    // =========================================================================
    // Cached endpoints
    // =========================================================================

    /// Empty result lists are not cached.
    pub async fn cached_search_multi(
        &self,
        query: &str,
        year: Option<i32>,
        limit: usize,
    ) -> Result<Cached<Vec<SearchCandidate>>, ProviderError> {
        let key = search_key("search", query, year, limit);
        self.cache
            .get_or_fetch_with_policy(
                CacheBucket::Tmdb,
                &key,
                || self.search_multi(query, year, limit),
                |results: &Vec<SearchCandidate>| !results.is_empty(),
            )
            .await
    }

    pub async fn cached_search_movies(
        &self,
        query: &str,
        year: Option<i32>,
        limit: usize,
    ) -> Result<Cached<Vec<SearchCandidate>>, ProviderError> {
        let key = search_key("movies", query, year, limit);
        self.cache
            .get_or_fetch_with_policy(
                CacheBucket::Tmdb,
                &key,
                || self.search_movies(query, year, limit),
                |results: &Vec<SearchCandidate>| !results.is_empty(),
            )
            .await
    }

    /// Misses are not cached.
    pub async fn cached_find_by_imdb_id(
        &self,
        imdb_id: &str,
    ) -> Result<Cached<Option<FindHit>>, ProviderError> {
        let key = id_key("find_imdb", imdb_id.trim().to_ascii_lowercase());
        self.cache
            .get_or_fetch_with_policy(
                CacheBucket::Tmdb,
                &key,
                || self.find_by_imdb_id(imdb_id.trim()),
                |hit: &Option<FindHit>| hit.is_some(),
            )
            .await
    }

    pub async fn cached_full_details(
        &self,
        id: u64,
        media_type: MediaType,
        force: bool,
    ) -> Result<Cached<Value>, ProviderError> {
        let key = id_key(&format!("{}_full", endpoint_segment(media_type)?), id);
        self.cache
            .fetch(CacheBucket::Tmdb, &key, force, || {
                self.full_details(id, media_type)
            })
            .await
    }

    pub async fn cached_metadata(
        &self,
        id: u64,
        media_type: MediaType,
        force: bool,
    ) -> Result<Cached<TmdbMetadata>, ProviderError> {
        let key = format!("metadata_{}_{}", endpoint_segment(media_type)?, id);
        self.cache
            .fetch(CacheBucket::Tmdb, &key, force, || async move {
                let details = self.cached_full_details(id, media_type, force).await?;
                Ok::<_, ProviderError>(metadata_from_details(id, media_type, &details.value))
            })
            .await
    }

    /// Absolute poster URL for an item, read from the cached full details.
    pub async fn cover_url(&self, id: u64, media_type: MediaType) -> Result<String, ProviderError> {
        let details = self.cached_full_details(id, media_type, false).await?;
        let poster_path = details
            .value
            .get("poster_path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or(ProviderError::NoPoster(id))?;

        Ok(self.image_url(poster_path))
    }

    pub fn image_url(&self, poster_path: &str) -> String {
        format!(
            "{}/{}",
            self.image_base_url,
            poster_path.trim_start_matches('/')
        )
    }

    fn params(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut params = vec![("api_key", self.api_key.clone())];
        params.extend(extra.iter().cloned());
        params
    }
}

fn endpoint_segment(media_type: MediaType) -> Result<&'static str, ProviderError> {
    match media_type {
        MediaType::Movie => Ok("movie"),
        MediaType::Tv => Ok("tv"),
        MediaType::Game => Err(ProviderError::InvalidMediaType(format!(
            "TMDB does not serve {}",
            media_type
        ))),
    }
}

fn json_u32(value: &Value, key: &str) -> Option<u32> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

fn json_string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build type metadata from a full details document.
pub fn metadata_from_details(id: u64, media_type: MediaType, details: &Value) -> TmdbMetadata {
    let genres = details
        .get("genres")
        .and_then(Value::as_array)
        .map(|genres| {
            genres
                .iter()
                .filter_map(|g| json_string(g, "name"))
                .collect()
        })
        .unwrap_or_default();

    let imdb_id = json_string(details, "imdb_id").or_else(|| {
        details
            .get("external_ids")
            .and_then(|ids| json_string(ids, "imdb_id"))
    });

    let runtime_mins = match media_type {
        MediaType::Tv => details
            .get("episode_run_time")
            .and_then(Value::as_array)
            .and_then(|runtimes| runtimes.first())
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok()),
        _ => json_u32(details, "runtime"),
    };

    TmdbMetadata {
        tmdb_id: id,
        imdb_id,
        runtime_mins,
        total_episodes: json_u32(details, "number_of_episodes"),
        total_seasons: json_u32(details, "number_of_seasons"),
        genres,
        status: json_string(details, "status"),
    }
}

// =============================================================================
// TMDB API Response Types (internal)
// =============================================================================

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbSearchItem>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchItem {
    id: u64,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f32>,
    vote_count: Option<u32>,
    popularity: Option<f64>,
    runtime: Option<u32>,
}

impl TmdbSearchItem {
    /// `None` for entries nobody ever voted on.
    fn into_candidate(self, media_type: MediaType) -> Option<SearchCandidate> {
        let vote_average = self.vote_average.unwrap_or(0.0);
        if vote_average == 0.0 {
            return None;
        }

        let title = self.title.or(self.name).unwrap_or_default();
        let release_date = self
            .release_date
            .or(self.first_air_date)
            .filter(|d| !d.is_empty());

        Some(SearchCandidate {
            id: self.id,
            media_type,
            title,
            release_date,
            vote_count: self.vote_count.unwrap_or(0),
            vote_average,
            popularity: self.popularity.unwrap_or(0.0),
            runtime_hint: self.runtime.filter(|r| *r > 0),
            overview: self.overview.filter(|o| !o.is_empty()),
            image: self.poster_path.filter(|p| !p.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TmdbFindResponse {
    #[serde(default)]
    movie_results: Vec<TmdbFindResult>,
    #[serde(default)]
    tv_results: Vec<TmdbFindResult>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindResult {
    id: u64,
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
    use crate::provider::RetryPolicy;
    use crate::ratelimit::RateLimitBreaker;

    fn create_client(server: &MockServer) -> TmdbClient {
        let http = HttpClient::new(
            Provider::Tmdb,
            Duration::from_secs(5),
            100,
            Arc::new(RateLimitBreaker::new(Provider::Tmdb)),
            RetryPolicy::default(),
        )
        .unwrap();
        let cache = PersistentCache::new(
            Arc::new(SqliteCacheStore::in_memory().unwrap()),
            DEFAULT_TTL,
        );
        let config = TmdbConfig {
            api_key: "test-key".to_string(),
            base_url: Some(server.uri()),
            image_base_url: Some("https://img.example/t/p/original/".to_string()),
            requests_per_second: 100,
            min_vote_count: 100,
            search_limit: 10,
        };
        TmdbClient::new(&config, http, cache).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let http = HttpClient::new(
            Provider::Tmdb,
            Duration::from_secs(5),
            4,
            Arc::new(RateLimitBreaker::new(Provider::Tmdb)),
            RetryPolicy::default(),
        )
        .unwrap();
        let cache = PersistentCache::new(
            Arc::new(SqliteCacheStore::in_memory().unwrap()),
            DEFAULT_TTL,
        );
        let config: TmdbConfig = toml::from_str(r#"api_key = """#).unwrap();
        assert_eq!(config.requests_per_second, 4);
        assert_eq!(config.min_vote_count, 100);

        let result = TmdbClient::new(&config, http, cache);
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_search_item_conversion_drops_unvoted() {
        let item: TmdbSearchItem = serde_json::from_value(json!({
            "id": 1,
            "media_type": "movie",
            "title": "Nobody Saw This",
            "release_date": "",
            "vote_average": 0.0
        }))
        .unwrap();
        assert!(item.into_candidate(MediaType::Movie).is_none());

        let item: TmdbSearchItem = serde_json::from_value(json!({
            "id": 1396,
            "media_type": "tv",
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "vote_average": 8.9,
            "vote_count": 13000
        }))
        .unwrap();
        let candidate = item.into_candidate(MediaType::Tv).unwrap();
        assert_eq!(candidate.title, "Breaking Bad");
        assert_eq!(candidate.year(), Some(2008));
        assert_eq!(candidate.vote_count, 13000);
    }

    #[test]
    fn test_metadata_from_movie_details() {
        let details = json!({
            "id": 603,
            "imdb_id": "tt0133093",
            "runtime": 136,
            "status": "Released",
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}]
        });
        let metadata = metadata_from_details(603, MediaType::Movie, &details);
        assert_eq!(metadata.runtime_mins, Some(136));
        assert_eq!(metadata.imdb_id.as_deref(), Some("tt0133093"));
        assert_eq!(metadata.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(metadata.total_episodes, None);
    }

    #[test]
    fn test_metadata_from_tv_details() {
        let details = json!({
            "id": 1396,
            "number_of_episodes": 62,
            "number_of_seasons": 5,
            "episode_run_time": [45],
            "genres": [{"name": "Drama"}],
            "external_ids": {"imdb_id": "tt0903747"}
        });
        let metadata = metadata_from_details(1396, MediaType::Tv, &details);
        assert_eq!(metadata.total_episodes, Some(62));
        assert_eq!(metadata.total_seasons, Some(5));
        assert_eq!(metadata.runtime_mins, Some(45));
        assert_eq!(metadata.imdb_id.as_deref(), Some("tt0903747"));
    }

    #[tokio::test]
    async fn test_search_multi_filters_people_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("query", "The Office"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": 2316, "media_type": "tv", "name": "The Office", "first_air_date": "2005-03-24", "vote_average": 8.6, "vote_count": 4000},
                    {"id": 17, "media_type": "person", "name": "Someone", "vote_average": 5.0},
                    {"id": 2996, "media_type": "tv", "name": "The Office", "first_air_date": "2001-07-09", "vote_average": 7.9, "vote_count": 900}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_client(&server);
        let first = client.cached_search_multi("The Office", None, 10).await.unwrap();
        assert_eq!(first.value.len(), 2);
        assert!(!first.from_cache);

        let second = client.cached_search_multi("the  office", None, 10).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn test_find_prefers_movie_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/find/tt0133093"))
            .and(query_param("external_source", "imdb_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "movie_results": [{"id": 603}],
                "tv_results": [{"id": 9999}]
            })))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let hit = client.cached_find_by_imdb_id("tt0133093").await.unwrap().value;
        assert_eq!(
            hit,
            Some(FindHit {
                tmdb_id: 603,
                media_type: MediaType::Movie
            })
        );
    }

    #[tokio::test]
    async fn test_cover_url_and_missing_poster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/603"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 603, "poster_path": "/abc.jpg"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/604"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 604, "poster_path": null})))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let url = client.cover_url(603, MediaType::Movie).await.unwrap();
        assert_eq!(url, "https://img.example/t/p/original/abc.jpg");
        // Served from cached full details the second time.
        client.cover_url(603, MediaType::Movie).await.unwrap();

        let err = client.cover_url(604, MediaType::Movie).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoPoster(604)));
    }

    #[tokio::test]
    async fn test_details_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let err = client.metadata(1, MediaType::Tv).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_game_type_is_rejected() {
        let server = MockServer::start().await;
        let client = create_client(&server);
        let err = client
            .cached_metadata(1, MediaType::Game, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidMediaType(_)));
    }
}
