//! Game records enriched from the Steam store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::merge::{fill_text, FillEmpty};
use super::movie::{BatchSummary, ItemWarning};
use crate::cover::{CoverPipeline, CoverRequest};
use crate::provider::{MediaType, ProviderError, SteamAppDetails, SteamClient};
use crate::resolver::{LookupRequest, Resolution, Resolver, SteamLookup};

/// A game note being imported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub title: String,
    pub year: Option<i32>,
    pub steam_app_id: Option<u64>,
    pub description: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub metacritic_score: Option<u32>,
    pub cover: Option<String>,
}

impl GameRecord {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
            ..Default::default()
        }
    }

    pub fn lookup_request(&self) -> LookupRequest {
        LookupRequest::new(self.title.clone())
            .with_year(self.year)
            .with_stored(self.steam_app_id, self.steam_app_id.map(|_| MediaType::Game))
            .expecting(Some(MediaType::Game))
    }
}

pub fn apply_app_details(record: &mut GameRecord, details: SteamAppDetails) {
    fill_text(&mut record.description, details.short_description.as_deref());
    fill_text(&mut record.release_date, details.release_date.as_deref());
    record.developers.fill_empty(details.developers);
    record.publishers.fill_empty(details.publishers);
    record.genres.fill_empty(details.genres);
    record.metacritic_score.fill_empty(details.metacritic_score);
}

#[derive(Debug, Clone, Default)]
pub struct SteamEnrichOptions {
    pub refresh_cache: bool,
    pub download_covers: bool,
    pub attachments_dir: PathBuf,
    pub note_dir: Option<PathBuf>,
    /// Deadline for one record; the record is skipped with a warning when
    /// it passes.
    pub item_timeout: Option<Duration>,
}

pub struct SteamEnricher {
    client: Arc<SteamClient>,
    resolver: Resolver<SteamLookup>,
    covers: Option<CoverPipeline>,
    options: SteamEnrichOptions,
}

impl SteamEnricher {
    pub fn new(client: Arc<SteamClient>, resolver: Resolver<SteamLookup>, options: SteamEnrichOptions) -> Self {
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

    /// Returns whether the record was matched to a Steam app.
    pub async fn enrich(&self, record: &mut GameRecord) -> Result<bool, ProviderError> {
        let reference = match self.resolver.resolve(&record.lookup_request()).await? {
            Resolution::Resolved(reference) => reference,
            Resolution::Unresolved => return Ok(false),
        };
        let app_id = reference.provider_id;
        record.steam_app_id = Some(app_id);

        let details = match self.client.cached_app_details(app_id, self.options.refresh_cache).await {
            Ok(cached) => cached.value,
            Err(e) if e.is_stop() => return Err(e),
            Err(e) => {
                warn!(title = %record.title, app_id, error = %e, "Failed to fetch Steam app details");
                None
            }
        };

        let Some(details) = details else {
            debug!(title = %record.title, app_id, "No Steam app details");
            return Ok(true);
        };

        let header_image = details.header_image.clone();
        apply_app_details(record, details);

        if let Some(url) = header_image {
            self.place_cover(record, app_id, &url).await;
        }
        Ok(true)
    }

    async fn place_cover(&self, record: &mut GameRecord, app_id: u64, url: &str) {
        let covers = match &self.covers {
            Some(covers) if self.options.download_covers => covers,
            _ => {
                fill_text(&mut record.cover, Some(url));
                return;
            }
        };

        let request = CoverRequest {
            title: &record.title,
            url,
            media_type: MediaType::Game,
            provider_id: app_id,
            dest_dir: &self.options.attachments_dir,
            note_dir: self.options.note_dir.as_deref(),
        };

        let link = match covers.ensure_cover(&request).await {
            Ok(asset) => asset
                .relative_path
                .unwrap_or(asset.local_path)
                .to_string_lossy()
                .into_owned(),
            Err(e) => {
                warn!(title = %record.title, error = %e, "Failed to download cover, linking remote URL instead");
                url.to_string()
            }
        };
        fill_text(&mut record.cover, Some(&link));
    }

    /// Enrich every record in input order; a stop ends the batch.
    pub async fn run_batch(&self, records: &mut [GameRecord]) -> Result<BatchSummary, ProviderError> {
        let mut summary = BatchSummary::default();

        for record in records.iter_mut() {
            let result = match self.options.item_timeout {
                Some(limit) => tokio::time::timeout(limit, self.enrich(record)).await.ok(),
                None => Some(self.enrich(record).await),
            };
            summary.processed += 1;

            match result {
                Some(Ok(true)) => summary.enriched += 1,
                Some(Ok(false)) => debug!(title = %record.title, "No Steam match"),
                Some(Err(e)) if e.is_stop() => {
                    info!(processed = summary.processed, "Stop requested, ending batch");
                    return Err(e);
                }
                Some(Err(e)) => {
                    warn!(title = %record.title, error = %e, "Steam enrichment failed");
                    summary.warnings.push(ItemWarning {
                        title: record.title.clone(),
                        message: e.to_string(),
                    });
                }
                None => {
                    warn!(title = %record.title, "Record timed out");
                    summary.warnings.push(ItemWarning {
                        title: record.title.clone(),
                        message: "timed out".to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }
}
