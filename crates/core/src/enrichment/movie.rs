//! Movie and series records: OMDB first, TMDB second.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::combinator::{EnrichError, EnrichmentReport, TwoStageEnrichment};
use super::merge::{fill_text, FillEmpty};
use super::tmdb::{TmdbEnricher, TmdbEnrichment};
use crate::provider::{MediaType, OmdbClient, OmdbRecord, Provider, ProviderError};
use crate::resolver::LookupRequest;

/// A movie or series note being imported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub title: String,
    pub year: Option<i32>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<u64>,
    pub tmdb_type: Option<MediaType>,
    pub plot: Option<String>,
    pub imdb_rating: Option<f32>,
    pub metascore: Option<u32>,
    pub rotten_tomatoes: Option<String>,
    pub runtime_mins: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    pub total_episodes: Option<u32>,
    pub total_seasons: Option<u32>,
    /// Local cover link, or the remote URL when no local copy exists.
    pub cover: Option<String>,
}

impl MovieRecord {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
            ..Default::default()
        }
    }

    pub fn lookup_request(&self, expected: Option<MediaType>) -> LookupRequest {
        LookupRequest::new(self.title.clone())
            .with_year(self.year)
            .with_external_id(self.imdb_id.clone())
            .with_stored(self.tmdb_id, self.tmdb_type)
            .expecting(expected)
    }

    fn has_plot(&self) -> bool {
        self.plot.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    fn has_local_cover(&self) -> bool {
        self.cover
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty() && !c.starts_with("http"))
    }
}

/// Merge an OMDB answer, never overwriting existing values.
pub fn apply_omdb(record: &mut MovieRecord, omdb: OmdbRecord) {
    fill_text(&mut record.imdb_id, omdb.imdb_id());
    fill_text(&mut record.plot, omdb.plot());
    fill_text(&mut record.rotten_tomatoes, omdb.rotten_tomatoes());
    fill_text(&mut record.cover, omdb.poster_url());
    record.imdb_rating.fill_empty(omdb.imdb_rating());
    record.metascore.fill_empty(omdb.metascore());
    record.runtime_mins.fill_empty(omdb.runtime_minutes());
    record.genres.fill_empty(omdb.genres());
    record.directors.fill_empty(omdb.directors());
    record.cast.fill_empty(omdb.actors());
}

/// Merge a TMDB answer.
///
/// The resolved identity always wins since the resolver already honoured
/// any stored ID. Content fields are fill-empty. A local cover replaces a
/// remote URL but never another local file.
pub fn apply_tmdb(record: &mut MovieRecord, tmdb: TmdbEnrichment) {
    record.tmdb_id = Some(tmdb.tmdb_id());
    record.tmdb_type = Some(tmdb.media_type());

    if let Some(metadata) = tmdb.metadata {
        fill_text(&mut record.imdb_id, metadata.imdb_id.as_deref());
        record.runtime_mins.fill_empty(metadata.runtime_mins);
        record.total_episodes.fill_empty(metadata.total_episodes);
        record.total_seasons.fill_empty(metadata.total_seasons);
        record.genres.fill_empty(metadata.genres);
    }

    match (tmdb.cover, tmdb.cover_url) {
        (Some(asset), _) if !record.has_local_cover() => {
            let link = asset.relative_path.unwrap_or(asset.local_path);
            record.cover = Some(link.to_string_lossy().into_owned());
        }
        (_, Some(url)) => {
            fill_text(&mut record.cover, Some(&url));
        }
        _ => {}
    }
}

/// Run-level switches for movie enrichment.
#[derive(Debug, Clone)]
pub struct MovieEnrichOptions {
    pub tmdb_enabled: bool,
    pub expected_media_type: Option<MediaType>,
    /// Deadline for a single record, including any interactive prompt.
    pub item_timeout: Option<Duration>,
}

impl Default for MovieEnrichOptions {
    fn default() -> Self {
        Self {
            tmdb_enabled: true,
            expected_media_type: None,
            item_timeout: None,
        }
    }
}

/// A record that could not be fully enriched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemWarning {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    /// Records that received data from at least one provider.
    pub enriched: usize,
    pub warnings: Vec<ItemWarning>,
}

/// Enriches movie records with OMDB and TMDB.
pub struct MovieEnricher {
    omdb: Option<Arc<OmdbClient>>,
    tmdb: Option<Arc<TmdbEnricher>>,
    options: MovieEnrichOptions,
}

impl MovieEnricher {
    pub fn new(
        omdb: Option<Arc<OmdbClient>>,
        tmdb: Option<Arc<TmdbEnricher>>,
        options: MovieEnrichOptions,
    ) -> Self {
        Self { omdb, tmdb, options }
    }

    pub fn options(&self) -> &MovieEnrichOptions {
        &self.options
    }

    pub async fn enrich(&self, record: &mut MovieRecord) -> Result<EnrichmentReport, EnrichError> {
        let request = record.lookup_request(self.options.expected_media_type);
        let mut enrichment = TwoStageEnrichment::new();

        if let Some(omdb) = self.omdb.clone() {
            let breaker = Arc::clone(omdb.http().breaker());
            let imdb_id = record.imdb_id.clone();
            let title = record.title.clone();
            let year = record.year;
            let rate_title = record.title.clone();
            let error_title = record.title.clone();

            enrichment = enrichment
                .primary(
                    Provider::Omdb,
                    async move { omdb.lookup(imdb_id.as_deref(), &title, year).await },
                    apply_omdb,
                )
                .skip_primary_when(record.has_plot())
                .on_primary_rate_limit(move |_| {
                    breaker.trip();
                    warn!(title = %rate_title, "OMDB rate limit reached, continuing with TMDB");
                })
                .on_primary_error(move |err| {
                    warn!(title = %error_title, error = %err, "OMDB enrichment failed");
                });
        }

        if let Some(tmdb) = self.tmdb.clone() {
            let error_title = record.title.clone();

            enrichment = enrichment
                .secondary(
                    Provider::Tmdb,
                    self.options.tmdb_enabled,
                    async move { tmdb.enrich(&request).await },
                    apply_tmdb,
                )
                .on_secondary_error(move |err| {
                    warn!(title = %error_title, error = %err, "TMDB enrichment failed");
                });
        }

        enrichment.run(record).await
    }

    /// Enrich every record in input order.
    ///
    /// Per-record failures become warnings. A user stop ends the batch and
    /// is returned as-is; records before it keep their enrichment.
    pub async fn run_batch(&self, records: &mut [MovieRecord]) -> Result<BatchSummary, ProviderError> {
        let mut summary = BatchSummary::default();

        for record in records.iter_mut() {
            let result = match self.options.item_timeout {
                Some(limit) => tokio::time::timeout(limit, self.enrich(record)).await.ok(),
                None => Some(self.enrich(record).await),
            };
            summary.processed += 1;

            match result {
                Some(Ok(report)) => {
                    if report.applied_any() {
                        summary.enriched += 1;
                    }
                    for outcome in report.errors() {
                        summary.warnings.push(ItemWarning {
                            title: record.title.clone(),
                            message: format!(
                                "{}: {}",
                                outcome.provider,
                                outcome.error.as_deref().unwrap_or_default()
                            ),
                        });
                    }
                    debug!(title = %record.title, "Record processed");
                }
                Some(Err(EnrichError::Stopped(err))) => {
                    info!(title = %record.title, processed = summary.processed, "Stop requested, ending batch");
                    return Err(err);
                }
                Some(Err(err)) => {
                    warn!(title = %record.title, error = %err, "Record not enriched");
                    summary.warnings.push(ItemWarning {
                        title: record.title.clone(),
                        message: err.to_string(),
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

        info!(
            processed = summary.processed,
            enriched = summary.enriched,
            warnings = summary.warnings.len(),
            "Batch finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::CoverAsset;
    use crate::provider::TmdbMetadata;
    use crate::resolver::{Confidence, ResolvedReference};
    use crate::testing::fixtures;
    use std::path::PathBuf;

    fn omdb_record() -> OmdbRecord {
        serde_json::from_value(serde_json::json!({
            "Title": "Heat",
            "Year": "1995",
            "Runtime": "170 min",
            "Genre": "Crime, Drama",
            "Director": "Michael Mann",
            "Actors": "Al Pacino, Robert De Niro",
            "Plot": "A group of professional bank robbers.",
            "Poster": "https://example.com/heat.jpg",
            "imdbRating": "8.3",
            "Metascore": "76",
            "imdbID": "tt0113277",
            "Type": "movie",
            "Ratings": [{"Source": "Rotten Tomatoes", "Value": "88%"}]
        }))
        .unwrap()
    }

    fn tmdb_enrichment(cover: Option<CoverAsset>) -> TmdbEnrichment {
        TmdbEnrichment {
            reference: ResolvedReference::new(949, MediaType::Movie, Confidence::Exact),
            metadata: Some(TmdbMetadata {
                tmdb_id: 949,
                imdb_id: Some("tt0113277".to_string()),
                runtime_mins: Some(171),
                genres: vec!["Action".to_string()],
                ..Default::default()
            }),
            cover_url: Some("https://image.example/heat.jpg".to_string()),
            cover,
        }
    }

    #[test]
    fn test_apply_omdb_fills_empty_fields() {
        let mut record = fixtures::movie_record("Heat", Some(1995), None);
        record.plot = Some("My own summary".to_string());

        apply_omdb(&mut record, omdb_record());

        assert_eq!(record.plot.as_deref(), Some("My own summary"));
        assert_eq!(record.imdb_id.as_deref(), Some("tt0113277"));
        assert_eq!(record.imdb_rating, Some(8.3));
        assert_eq!(record.metascore, Some(76));
        assert_eq!(record.rotten_tomatoes.as_deref(), Some("88%"));
        assert_eq!(record.runtime_mins, Some(170));
        assert_eq!(record.genres, vec!["Crime".to_string(), "Drama".to_string()]);
        assert_eq!(record.cover.as_deref(), Some("https://example.com/heat.jpg"));
    }

    #[test]
    fn test_apply_tmdb_sets_identity_and_keeps_content() {
        let mut record = fixtures::movie_record("Heat", Some(1995), None);
        record.runtime_mins = Some(170);
        record.tmdb_id = Some(1);

        apply_tmdb(&mut record, tmdb_enrichment(None));

        assert_eq!(record.tmdb_id, Some(949));
        assert_eq!(record.tmdb_type, Some(MediaType::Movie));
        assert_eq!(record.runtime_mins, Some(170));
        assert_eq!(record.genres, vec!["Action".to_string()]);
        assert_eq!(record.cover.as_deref(), Some("https://image.example/heat.jpg"));
    }

    #[test]
    fn test_local_cover_replaces_remote_url() {
        let mut record = fixtures::movie_record("Heat", Some(1995), None);
        record.cover = Some("https://example.com/heat.jpg".to_string());

        let asset = CoverAsset {
            downloaded: true,
            local_path: PathBuf::from("/vault/attachments/Heat - cover.jpg"),
            relative_path: Some(PathBuf::from("attachments/Heat - cover.jpg")),
            filename: "Heat - cover.jpg".to_string(),
        };
        apply_tmdb(&mut record, tmdb_enrichment(Some(asset.clone())));
        assert_eq!(record.cover.as_deref(), Some("attachments/Heat - cover.jpg"));

        record.cover = Some("covers/custom.jpg".to_string());
        apply_tmdb(&mut record, tmdb_enrichment(Some(asset)));
        assert_eq!(record.cover.as_deref(), Some("covers/custom.jpg"));
    }

    #[test]
    fn test_lookup_request_carries_stored_identity() {
        let mut record = fixtures::movie_record("Heat", Some(1995), Some("tt0113277"));
        record.tmdb_id = Some(949);
        record.tmdb_type = Some(MediaType::Movie);

        let request = record.lookup_request(Some(MediaType::Movie));
        assert_eq!(request.external_id.as_deref(), Some("tt0113277"));
        assert_eq!(request.stored_id, Some(949));
        assert_eq!(request.stored_media_type, Some(MediaType::Movie));
        assert_eq!(request.expected_media_type, Some(MediaType::Movie));
    }

    #[tokio::test]
    async fn test_enricher_without_providers_is_noop() {
        let enricher = MovieEnricher::new(None, None, MovieEnrichOptions::default());
        let mut records = vec![fixtures::movie_record("Heat", Some(1995), None)];

        let summary = enricher.run_batch(&mut records).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.enriched, 0);
        assert!(summary.warnings.is_empty());
    }
}
