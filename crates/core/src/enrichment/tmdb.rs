//! TMDB stage: resolve the ID, pull type metadata, acquire the cover.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cover::{CoverAsset, CoverPipeline, CoverRequest};
use crate::provider::{MediaType, ProviderError, TmdbClient, TmdbMetadata};
use crate::resolver::{
    Confidence, LookupRequest, Resolution, ResolvedReference, Resolver, TmdbLookup,
};

/// Settings for the TMDB stage.
#[derive(Debug, Clone, Default)]
pub struct TmdbEnrichOptions {
    /// Bypass the cache for metadata.
    pub refresh_cache: bool,
    pub download_covers: bool,
    /// Directory covers are placed in.
    pub attachments_dir: PathBuf,
    /// Directory of the notes, for relative cover links.
    pub note_dir: Option<PathBuf>,
}

/// Everything the TMDB stage found for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct TmdbEnrichment {
    pub reference: ResolvedReference,
    pub metadata: Option<TmdbMetadata>,
    /// Remote poster URL.
    pub cover_url: Option<String>,
    /// Local copy of the poster, when it could be downloaded.
    pub cover: Option<CoverAsset>,
}

impl TmdbEnrichment {
    pub fn tmdb_id(&self) -> u64 {
        self.reference.provider_id
    }

    pub fn media_type(&self) -> MediaType {
        self.reference.media_type
    }

    pub fn confidence(&self) -> Confidence {
        self.reference.confidence
    }
}

/// Runs the TMDB stage for one lookup request.
pub struct TmdbEnricher {
    client: Arc<TmdbClient>,
    resolver: Resolver<TmdbLookup>,
    covers: Option<CoverPipeline>,
    options: TmdbEnrichOptions,
}

impl TmdbEnricher {
    pub fn new(client: Arc<TmdbClient>, resolver: Resolver<TmdbLookup>, options: TmdbEnrichOptions) -> Self {
        Self {
            client,
            resolver,
            covers: None,
            options,
        }
    }

    pub fn with_covers(mut self, covers: CoverPipeline) -> Self {
        self.covers = Some(covers);
        self
    }

    /// `Ok(None)` when the item could not be resolved (or was skipped).
    /// Resolution errors, including a user stop, are returned; metadata and
    /// cover failures only log.
    pub async fn enrich(&self, request: &LookupRequest) -> Result<Option<TmdbEnrichment>, ProviderError> {
        let reference = match self.resolver.resolve(request).await? {
            Resolution::Resolved(reference) => reference,
            Resolution::Unresolved => {
                debug!(title = %request.title, "No TMDB match");
                return Ok(None);
            }
        };

        let metadata = match self
            .client
            .cached_metadata(reference.provider_id, reference.media_type, self.options.refresh_cache)
            .await
        {
            Ok(cached) => Some(cached.value),
            Err(e) => {
                warn!(
                    title = %request.title,
                    tmdb_id = reference.provider_id,
                    error = %e,
                    "Failed to fetch TMDB metadata"
                );
                None
            }
        };

        let (cover_url, cover) = match &self.covers {
            Some(covers) if self.options.download_covers => {
                self.acquire_cover(covers, &request.title, &reference).await
            }
            _ => (None, None),
        };

        Ok(Some(TmdbEnrichment {
            reference,
            metadata,
            cover_url,
            cover,
        }))
    }

    async fn acquire_cover(
        &self,
        covers: &CoverPipeline,
        title: &str,
        reference: &ResolvedReference,
    ) -> (Option<String>, Option<CoverAsset>) {
        let url = match self
            .client
            .cover_url(reference.provider_id, reference.media_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                debug!(title, tmdb_id = reference.provider_id, error = %e, "No TMDB cover");
                return (None, None);
            }
        };

        let request = CoverRequest {
            title,
            url: &url,
            media_type: reference.media_type,
            provider_id: reference.provider_id,
            dest_dir: &self.options.attachments_dir,
            note_dir: self.options.note_dir.as_deref(),
        };

        match covers.ensure_cover(&request).await {
            Ok(asset) => (Some(url), Some(asset)),
            Err(e) => {
                warn!(title, error = %e, "Failed to download cover, linking remote URL instead");
                (Some(url), None)
            }
        }
    }
}
