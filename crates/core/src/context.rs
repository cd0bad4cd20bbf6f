//! Run-scoped wiring: one cache, one set of breakers, one client per
//! provider. Everything a command needs is built from a [`Config`] here.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cache::{CacheError, CacheStore, PersistentCache, SqliteCacheStore};
use crate::config::Config;
use crate::cover::CoverPipeline;
use crate::enrichment::{
    MovieEnrichOptions, MovieEnricher, SteamEnrichOptions, SteamEnricher, TmdbEnrichOptions,
    TmdbEnricher,
};
use crate::provider::{
    HttpClient, MediaType, OmdbClient, Provider, ProviderError, SteamClient, SteamConfig,
    TmdbClient,
};
use crate::ratelimit::{ProviderBreakers, RateLimitBreaker};
use crate::resolver::{CandidateSelector, Resolver, SteamLookup, TmdbLookup};

/// Errors while setting up a run.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to open cache: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to create provider client: {0}")]
    Provider(#[from] ProviderError),
}

pub struct RunContext {
    config: Config,
    cache: PersistentCache,
    breakers: ProviderBreakers,
    tmdb: Option<Arc<TmdbClient>>,
    omdb: Option<Arc<OmdbClient>>,
    steam: Arc<SteamClient>,
    selector: Option<Arc<dyn CandidateSelector>>,
}

impl RunContext {
    /// Open the SQLite cache named in the config and build the clients.
    pub fn from_config(config: Config) -> Result<Self, ContextError> {
        let store = SqliteCacheStore::new(&config.cache.path)?;
        info!(path = %config.cache.path.display(), "Cache opened");
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: Config, store: Arc<dyn CacheStore>) -> Result<Self, ContextError> {
        let cache = PersistentCache::new(store, config.cache.ttl());
        let breakers = ProviderBreakers::new();

        let tmdb = match &config.tmdb {
            Some(tmdb_config) => {
                let http = provider_http(&config, Provider::Tmdb, tmdb_config.requests_per_second, &breakers)?;
                Some(Arc::new(TmdbClient::new(tmdb_config, http, cache.clone())?))
            }
            None => {
                info!("No TMDB configured");
                None
            }
        };

        let omdb = match &config.omdb {
            Some(omdb_config) => {
                let http = provider_http(&config, Provider::Omdb, omdb_config.requests_per_second, &breakers)?;
                Some(Arc::new(OmdbClient::new(omdb_config, http, cache.clone())?))
            }
            None => {
                info!("No OMDB configured");
                None
            }
        };

        let steam_config = config.steam.clone().unwrap_or_default();
        let steam_http = provider_http(&config, Provider::Steam, steam_config.requests_per_second, &breakers)?;
        let steam = Arc::new(SteamClient::new(&steam_config, steam_http, cache.clone()));

        Ok(Self {
            config,
            cache,
            breakers,
            tmdb,
            omdb,
            steam,
            selector: None,
        })
    }

    /// Selector used when `enrichment.interactive` is set.
    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    pub fn breakers(&self) -> &ProviderBreakers {
        &self.breakers
    }

    pub fn tmdb(&self) -> Option<&Arc<TmdbClient>> {
        self.tmdb.as_ref()
    }

    pub fn omdb(&self) -> Option<&Arc<OmdbClient>> {
        self.omdb.as_ref()
    }

    pub fn steam(&self) -> &Arc<SteamClient> {
        &self.steam
    }

    pub fn tmdb_resolver(&self) -> Option<Resolver<TmdbLookup>> {
        let client = self.tmdb.as_ref()?;
        let tmdb_config = self.config.tmdb.as_ref()?;
        let lookup = TmdbLookup::new(Arc::clone(client)).movies_only(self.config.enrichment.movies_only);
        let options = self
            .config
            .enrichment
            .resolver_options(tmdb_config.min_vote_count, tmdb_config.search_limit);

        Some(self.attach_selector(Resolver::new(lookup, options)))
    }

    pub fn steam_resolver(&self) -> Resolver<SteamLookup> {
        let search_limit = self
            .config
            .steam
            .as_ref()
            .map(|s| s.search_limit)
            .unwrap_or_else(|| SteamConfig::default().search_limit);
        // Store search carries no votes; the threshold would drop everything.
        let options = self.config.enrichment.resolver_options(0, search_limit);

        self.attach_selector(Resolver::new(SteamLookup::new(Arc::clone(&self.steam)), options))
    }

    pub fn tmdb_enricher(&self) -> Result<Option<TmdbEnricher>, ContextError> {
        let (Some(client), Some(resolver)) = (self.tmdb.as_ref(), self.tmdb_resolver()) else {
            return Ok(None);
        };

        let options = TmdbEnrichOptions {
            refresh_cache: self.config.enrichment.refresh_cache,
            download_covers: self.config.enrichment.download_covers,
            attachments_dir: self.config.covers.attachments_dir.clone(),
            note_dir: self.config.covers.note_dir.clone(),
        };
        let enricher = TmdbEnricher::new(Arc::clone(client), resolver, options)
            .with_covers(self.cover_pipeline(Provider::Tmdb)?);
        Ok(Some(enricher))
    }

    pub fn movie_enricher(&self, expected: Option<MediaType>) -> Result<MovieEnricher, ContextError> {
        let options = MovieEnrichOptions {
            tmdb_enabled: self.config.enrichment.tmdb_enabled,
            expected_media_type: expected,
            item_timeout: self.config.enrichment.item_timeout(),
        };
        let tmdb = self.tmdb_enricher()?.map(Arc::new);
        Ok(MovieEnricher::new(self.omdb.clone(), tmdb, options))
    }

    pub fn steam_enricher(&self) -> Result<SteamEnricher, ContextError> {
        let options = SteamEnrichOptions {
            refresh_cache: self.config.enrichment.refresh_cache,
            download_covers: self.config.enrichment.download_covers,
            attachments_dir: self.config.covers.attachments_dir.clone(),
            note_dir: self.config.covers.note_dir.clone(),
            item_timeout: self.config.enrichment.item_timeout(),
        };
        Ok(SteamEnricher::new(Arc::clone(&self.steam), self.steam_resolver(), options)
            .with_covers(self.cover_pipeline(Provider::Steam)?))
    }

    /// Image downloads go through their own client and breaker so a
    /// tripped API breaker never blocks covers of already-resolved items.
    fn cover_pipeline(&self, provider: Provider) -> Result<CoverPipeline, ContextError> {
        let images = HttpClient::new(
            provider,
            self.config.http.timeout(),
            IMAGE_REQUESTS_PER_SECOND,
            Arc::new(RateLimitBreaker::new(provider)),
            self.config.http.retry_policy(),
        )?;
        Ok(CoverPipeline::new(Arc::new(images), self.config.covers.options()))
    }

    fn attach_selector<B>(&self, resolver: Resolver<B>) -> Resolver<B>
    where
        B: crate::resolver::LookupBackend,
    {
        match &self.selector {
            Some(selector) => resolver.with_selector(Arc::clone(selector)),
            None => resolver,
        }
    }
}

const IMAGE_REQUESTS_PER_SECOND: u32 = 4;

fn provider_http(
    config: &Config,
    provider: Provider,
    requests_per_second: u32,
    breakers: &ProviderBreakers,
) -> Result<HttpClient, ProviderError> {
    HttpClient::new(
        provider,
        config.http.timeout(),
        requests_per_second,
        breakers.get(provider),
        config.http.retry_policy(),
    )
}
