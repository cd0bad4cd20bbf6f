pub mod cache;
pub mod config;
pub mod context;
pub mod cover;
pub mod enrichment;
pub mod provider;
pub mod ratelimit;
pub mod resolver;
pub mod testing;

pub use cache::{
    BucketStats, CacheBucket, CacheEntry, CacheError, CacheStore, Cached, PersistentCache,
    SqliteCacheStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use context::{ContextError, RunContext};
pub use cover::{CoverAsset, CoverError, CoverOptions, CoverPipeline, CoverRequest, ImageSource};
pub use enrichment::{
    BatchSummary, EnrichError, EnrichmentReport, GameRecord, MovieEnricher, MovieRecord,
    SteamEnricher, TmdbEnricher, TwoStageEnrichment,
};
pub use provider::{
    HttpClient, MediaType, OmdbClient, Provider, ProviderError, SearchCandidate, SteamClient,
    TmdbClient,
};
pub use ratelimit::{ProviderBreakers, RateLimitBreaker};
pub use resolver::{
    CandidateSelector, Confidence, LookupBackend, LookupRequest, Resolution, ResolvedReference,
    Resolver, ResolverOptions, Selection,
};
