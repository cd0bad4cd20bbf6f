//! Lookup backends for the concrete providers.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Confidence, LookupBackend, ResolvedReference, SearchQuery, TypeSignals};
use crate::provider::{
    MediaType, Provider, ProviderError, SearchCandidate, SteamClient, TmdbClient,
};

/// TMDB movies and TV series.
pub struct TmdbLookup {
    client: Arc<TmdbClient>,
    movies_only: bool,
}

impl TmdbLookup {
    pub fn new(client: Arc<TmdbClient>) -> Self {
        Self {
            client,
            movies_only: false,
        }
    }

    /// Search `/search/movie` instead of `/search/multi`.
    pub fn movies_only(mut self, movies_only: bool) -> Self {
        self.movies_only = movies_only;
        self
    }
}

#[async_trait]
impl LookupBackend for TmdbLookup {
    fn provider(&self) -> Provider {
        Provider::Tmdb
    }

    fn probe_types(&self) -> &[MediaType] {
        &[MediaType::Movie, MediaType::Tv]
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<ResolvedReference>, ProviderError> {
        let hit = self.client.cached_find_by_imdb_id(external_id).await?.value;
        Ok(hit.map(|hit| ResolvedReference::new(hit.tmdb_id, hit.media_type, Confidence::Exact)))
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchCandidate>, ProviderError> {
        let results = if self.movies_only {
            self.client
                .cached_search_movies(query.title, query.year, query.limit)
                .await?
        } else {
            self.client
                .cached_search_multi(query.title, query.year, query.limit)
                .await?
        };
        Ok(results.value)
    }

    async fn type_signals(&self, id: u64, media_type: MediaType) -> Result<TypeSignals, ProviderError> {
        let metadata = self.client.cached_metadata(id, media_type, false).await?.value;
        let strong = match media_type {
            MediaType::Movie => metadata.runtime_mins.is_some(),
            MediaType::Tv => metadata.total_episodes.is_some(),
            MediaType::Game => false,
        };
        Ok(TypeSignals {
            strong,
            genre_count: metadata.genres.len(),
        })
    }
}

/// Steam storefront games. Titles only; Steam search ignores years and has
/// no vote data.
pub struct SteamLookup {
    client: Arc<SteamClient>,
}

impl SteamLookup {
    pub fn new(client: Arc<SteamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LookupBackend for SteamLookup {
    fn provider(&self) -> Provider {
        Provider::Steam
    }

    fn probe_types(&self) -> &[MediaType] {
        &[MediaType::Game]
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchCandidate>, ProviderError> {
        let mut results = self.client.cached_search(query.title).await?.value;
        results.truncate(query.limit);
        Ok(results)
    }

    fn matches_year(&self) -> bool {
        false
    }

    async fn type_signals(&self, _id: u64, _media_type: MediaType) -> Result<TypeSignals, ProviderError> {
        Ok(TypeSignals {
            strong: true,
            genre_count: 0,
        })
    }
}
