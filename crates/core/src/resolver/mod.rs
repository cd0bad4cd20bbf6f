//! Provider ID resolution.
//!
//! Maps a human-entered title (plus optional year, external ID and a
//! previously stored ID) to one provider identifier. The algorithm is shared
//! by every provider; provider specifics live behind [`LookupBackend`].
//!
//! Order of precedence:
//! 1. stored ID (unless forced), with a type probe when its type is unknown
//! 2. external-ID lookup
//! 3. title search, vote filtering and candidate selection

mod backends;
mod matching;
mod types;

pub use backends::{SteamLookup, TmdbLookup};
pub use matching::{filter_candidates, find_exact_match, prioritize_media_type};
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::provider::{MediaType, Provider, ProviderError, SearchCandidate};

/// Provider-specific half of the resolver.
#[async_trait]
pub trait LookupBackend: Send + Sync {
    fn provider(&self) -> Provider;

    /// Types a stored ID may have, in tie-break order.
    fn probe_types(&self) -> &[MediaType];

    /// Resolve a cross-provider identifier. Backends without such a lookup
    /// keep the default.
    async fn find_by_external_id(
        &self,
        _external_id: &str,
    ) -> Result<Option<ResolvedReference>, ProviderError> {
        Ok(None)
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchCandidate>, ProviderError>;

    /// Whether candidates carry a release year. Backends returning `false`
    /// get exact matches on title alone.
    fn matches_year(&self) -> bool {
        true
    }

    /// Evidence that `id` is of `media_type`. An error means the probe
    /// failed (usually: no such item of that type).
    async fn type_signals(&self, id: u64, media_type: MediaType) -> Result<TypeSignals, ProviderError>;
}

/// Interactive chooser for ambiguous results.
#[async_trait]
pub trait CandidateSelector: Send + Sync {
    async fn select(
        &self,
        provider: Provider,
        title: &str,
        candidates: &[SearchCandidate],
    ) -> Result<Selection, ProviderError>;
}

/// Resolves titles to provider IDs through a [`LookupBackend`].
pub struct Resolver<B> {
    backend: B,
    selector: Option<Arc<dyn CandidateSelector>>,
    options: ResolverOptions,
}

impl<B: LookupBackend> Resolver<B> {
    pub fn new(backend: B, options: ResolverOptions) -> Self {
        Self {
            backend,
            selector: None,
            options,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn CandidateSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve `request` to a provider ID.
    ///
    /// Returns `Err(StopRequested)` when the user stops from the selector;
    /// `Ok(Unresolved)` when nothing matched or the user skipped.
    pub async fn resolve(&self, request: &LookupRequest) -> Result<Resolution, ProviderError> {
        let provider = self.backend.provider();

        let stored_id = match request.stored_id {
            Some(id) if !self.options.force => id,
            _ => return self.search(request, false).await,
        };

        let media_type = match request.stored_media_type {
            Some(media_type) => media_type,
            None => self.infer_media_type(stored_id).await?,
        };
        debug!(%provider, id = stored_id, %media_type, title = %request.title, "Using stored identifier");

        if let Some(expected) = request.expected_media_type {
            if expected != media_type {
                info!(
                    %provider,
                    id = stored_id,
                    stored = %media_type,
                    %expected,
                    title = %request.title,
                    "Stored identifier has unexpected type, searching again"
                );
                let force_prompt = self.is_interactive();
                if let Resolution::Resolved(reference) = self.search(request, force_prompt).await? {
                    return Ok(Resolution::Resolved(reference));
                }
                debug!(%provider, id = stored_id, "Search found nothing better, keeping stored identifier");
            }
        }

        Ok(Resolution::Resolved(ResolvedReference::new(
            stored_id,
            media_type,
            Confidence::Exact,
        )))
    }

    /// Probe every candidate type and score the evidence.
    ///
    /// Highest score wins, ties go to the earlier probe type. With no
    /// evidence at all the last type whose probe succeeded wins.
    async fn infer_media_type(&self, id: u64) -> Result<MediaType, ProviderError> {
        let types = self.backend.probe_types();
        if let [only] = types {
            return Ok(*only);
        }

        let mut scored = Vec::with_capacity(types.len());
        let mut first_error = None;
        for &media_type in types {
            match self.backend.type_signals(id, media_type).await {
                Ok(signals) => scored.push((media_type, signals.score())),
                Err(e) => {
                    debug!(id, %media_type, error = %e, "Type probe failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        let best = scored.iter().map(|(_, score)| *score).max();
        let chosen = match best {
            None => {
                return Err(first_error.unwrap_or_else(|| {
                    ProviderError::InvalidMediaType(format!("no probe types for id {}", id))
                }))
            }
            Some(0) => scored.last().map(|(media_type, _)| *media_type),
            Some(best) => scored
                .iter()
                .find(|(_, score)| *score == best)
                .map(|(media_type, _)| *media_type),
        };

        chosen.ok_or_else(|| ProviderError::InvalidMediaType(format!("no probe types for id {}", id)))
    }

    async fn search(&self, request: &LookupRequest, force_prompt: bool) -> Result<Resolution, ProviderError> {
        let provider = self.backend.provider();

        if let Some(external_id) = request.external_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            match self.backend.find_by_external_id(external_id).await {
                Ok(Some(reference)) => {
                    debug!(%provider, external_id, id = reference.provider_id, "Resolved through external identifier");
                    return Ok(Resolution::Resolved(reference));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%provider, external_id, error = %e, "External identifier lookup failed, falling back to search");
                }
            }
        }

        let query = SearchQuery {
            title: &request.title,
            year: request.year,
            limit: self.options.search_limit,
        };
        let candidates = self.backend.search(&query).await?;
        if candidates.is_empty() {
            debug!(%provider, title = %request.title, "No search results");
            return Ok(Resolution::Unresolved);
        }

        let candidates = filter_candidates(
            candidates,
            self.options.min_vote_count,
            request.expected_media_type,
        );
        if candidates.is_empty() {
            debug!(%provider, title = %request.title, "All results filtered out");
            return Ok(Resolution::Unresolved);
        }

        self.select(request, candidates, force_prompt).await
    }

    async fn select(
        &self,
        request: &LookupRequest,
        candidates: Vec<SearchCandidate>,
        force_prompt: bool,
    ) -> Result<Resolution, ProviderError> {
        let provider = self.backend.provider();
        let year = if self.backend.matches_year() { request.year } else { None };
        let exact = find_exact_match(&candidates, &request.title, year).cloned();

        if let [only] = candidates.as_slice() {
            let confidence = if exact.is_some() {
                Confidence::Exact
            } else {
                Confidence::Heuristic
            };
            return Ok(Resolution::Resolved(ResolvedReference::from_candidate(only, confidence)));
        }

        if !force_prompt {
            if let Some(exact) = &exact {
                return Ok(Resolution::Resolved(ResolvedReference::from_candidate(
                    exact,
                    Confidence::Exact,
                )));
            }
        }

        if let Some(selector) = self.interactive_selector() {
            return match selector.select(provider, &request.title, &candidates).await? {
                Selection::Selected(candidate) => Ok(Resolution::Resolved(
                    ResolvedReference::from_candidate(&candidate, Confidence::UserChosen),
                )),
                Selection::Skipped => {
                    info!(%provider, title = %request.title, "Skipped by user");
                    Ok(Resolution::Unresolved)
                }
                Selection::Stopped => Err(ProviderError::stop(format!(
                    "{} selection stopped by user",
                    provider
                ))),
            };
        }

        let (chosen, confidence) = match &exact {
            Some(exact) => (exact, Confidence::Exact),
            None => (&candidates[0], Confidence::Heuristic),
        };
        Ok(Resolution::Resolved(ResolvedReference::from_candidate(chosen, confidence)))
    }

    fn is_interactive(&self) -> bool {
        self.interactive_selector().is_some()
    }

    fn interactive_selector(&self) -> Option<&Arc<dyn CandidateSelector>> {
        if self.options.interactive {
            self.selector.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockLookupBackend, ScriptedSelector};

    fn options(interactive: bool) -> ResolverOptions {
        ResolverOptions {
            interactive,
            ..ResolverOptions::default()
        }
    }

    fn guardians_backend() -> MockLookupBackend {
        MockLookupBackend::tmdb().with_results(vec![
            fixtures::candidate(1, MediaType::Movie, "Guardians of the Galaxy Vol. 2", "2017-04-19", 20000),
            fixtures::candidate(2, MediaType::Movie, "Guardians", "2017-02-23", 300),
            fixtures::candidate(3, MediaType::Movie, "Naruto the Movie: Guardians of the Crescent Moon Kingdom", "2006-08-05", 150),
        ])
    }

    #[tokio::test]
    async fn test_unique_exact_match_wins_without_prompt() {
        let selector = Arc::new(ScriptedSelector::new(vec![Selection::Stopped]));
        let resolver = Resolver::new(guardians_backend(), options(true)).with_selector(selector.clone());

        let resolution = resolver
            .resolve(&LookupRequest::new("Guardians").with_year(Some(2017)))
            .await
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Resolved(ResolvedReference::new(2, MediaType::Movie, Confidence::Exact))
        );
        assert_eq!(selector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_yearless_backend_matches_title_only() {
        let backend = MockLookupBackend::steam().with_results(vec![
            fixtures::candidate(620, MediaType::Game, "Portal 2", "", 0),
            fixtures::candidate(400, MediaType::Game, "Portal", "", 0),
        ]);
        let no_vote_floor = ResolverOptions {
            min_vote_count: 0,
            ..options(false)
        };
        let resolver = Resolver::new(backend, no_vote_floor);

        let resolution = resolver
            .resolve(&LookupRequest::new("Portal").with_year(Some(2007)))
            .await
            .unwrap();

        assert_eq!(
            resolution.reference().unwrap(),
            &ResolvedReference::new(400, MediaType::Game, Confidence::Exact)
        );
    }

    #[tokio::test]
    async fn test_non_interactive_falls_back_to_first_candidate() {
        let resolver = Resolver::new(guardians_backend(), options(false));

        let resolution = resolver
            .resolve(&LookupRequest::new("Guardians of the Galaxy").with_year(Some(2017)))
            .await
            .unwrap();

        assert_eq!(
            resolution.reference().unwrap(),
            &ResolvedReference::new(1, MediaType::Movie, Confidence::Heuristic)
        );
    }

    #[tokio::test]
    async fn test_interactive_selection_variants() {
        let backend_results = guardians_backend();
        let pick = backend_results.results()[2].clone();
        let selector = Arc::new(ScriptedSelector::new(vec![
            Selection::Selected(pick),
            Selection::Skipped,
            Selection::Stopped,
        ]));
        let resolver = Resolver::new(backend_results, options(true)).with_selector(selector.clone());
        let request = LookupRequest::new("Guardians of the Galaxy").with_year(Some(2017));

        let chosen = resolver.resolve(&request).await.unwrap();
        assert_eq!(
            chosen.reference().unwrap(),
            &ResolvedReference::new(3, MediaType::Movie, Confidence::UserChosen)
        );

        assert_eq!(resolver.resolve(&request).await.unwrap(), Resolution::Unresolved);

        let err = resolver.resolve(&request).await.unwrap_err();
        assert!(err.is_stop());
        assert_eq!(selector.call_count(), 3);
    }

    #[tokio::test]
    async fn test_single_candidate_auto_selects() {
        let backend = MockLookupBackend::tmdb().with_results(vec![fixtures::candidate(
            42,
            MediaType::Movie,
            "Arrival",
            "2016-11-10",
            15000,
        )]);
        let selector = Arc::new(ScriptedSelector::new(vec![Selection::Stopped]));
        let resolver = Resolver::new(backend, options(true)).with_selector(selector.clone());

        let resolution = resolver
            .resolve(&LookupRequest::new("Arrival (Extended)"))
            .await
            .unwrap();

        assert_eq!(
            resolution.reference().unwrap(),
            &ResolvedReference::new(42, MediaType::Movie, Confidence::Heuristic)
        );
        assert_eq!(selector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_and_fully_filtered_results_are_unresolved() {
        let resolver = Resolver::new(MockLookupBackend::tmdb(), options(false));
        assert_eq!(
            resolver.resolve(&LookupRequest::new("Nothing")).await.unwrap(),
            Resolution::Unresolved
        );

        let backend = MockLookupBackend::tmdb().with_results(vec![fixtures::candidate(
            5,
            MediaType::Movie,
            "Obscure",
            "1999-01-01",
            3,
        )]);
        let resolver = Resolver::new(backend, options(false));
        assert_eq!(
            resolver.resolve(&LookupRequest::new("Obscure")).await.unwrap(),
            Resolution::Unresolved
        );
    }

    #[tokio::test]
    async fn test_expected_type_keeps_low_vote_candidates() {
        let backend = MockLookupBackend::tmdb().with_results(vec![
            fixtures::candidate(10, MediaType::Movie, "Show", "2020-01-01", 5000),
            fixtures::candidate(11, MediaType::Tv, "Show", "2020-01-01", 12),
        ]);
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(
                &LookupRequest::new("Some Show")
                    .with_year(Some(2020))
                    .expecting(Some(MediaType::Tv)),
            )
            .await
            .unwrap();

        // TV candidate survives the vote filter and is ranked first.
        assert_eq!(resolution.reference().unwrap().provider_id, 11);
    }

    #[tokio::test]
    async fn test_stored_id_with_known_type_skips_network() {
        let backend = guardians_backend();
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(&LookupRequest::new("Whatever").with_stored(Some(603), Some(MediaType::Movie)))
            .await
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Resolved(ResolvedReference::new(603, MediaType::Movie, Confidence::Exact))
        );
        assert_eq!(resolver.backend().search_count(), 0);
        assert_eq!(resolver.backend().probe_count(), 0);
    }

    #[tokio::test]
    async fn test_type_probe_prefers_tv_with_episodes() {
        let backend = MockLookupBackend::tmdb()
            .with_signals(1396, MediaType::Movie, TypeSignals { strong: false, genre_count: 1 })
            .with_signals(1396, MediaType::Tv, TypeSignals { strong: true, genre_count: 1 });
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(&LookupRequest::new("Breaking Bad").with_stored(Some(1396), None))
            .await
            .unwrap();
        assert_eq!(resolution.reference().unwrap().media_type, MediaType::Tv);
    }

    #[tokio::test]
    async fn test_type_probe_tie_goes_to_movie() {
        let signals = TypeSignals { strong: false, genre_count: 2 };
        let backend = MockLookupBackend::tmdb()
            .with_signals(7, MediaType::Movie, signals)
            .with_signals(7, MediaType::Tv, signals);
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(&LookupRequest::new("Tie").with_stored(Some(7), None))
            .await
            .unwrap();
        assert_eq!(resolution.reference().unwrap().media_type, MediaType::Movie);
    }

    #[tokio::test]
    async fn test_type_probe_without_evidence_uses_successful_probe() {
        // Movie probe fails, TV probe succeeds with no signals.
        let backend = MockLookupBackend::tmdb().with_signals(8, MediaType::Tv, TypeSignals::default());
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(&LookupRequest::new("Quiet").with_stored(Some(8), None))
            .await
            .unwrap();
        assert_eq!(resolution.reference().unwrap().media_type, MediaType::Tv);
    }

    #[tokio::test]
    async fn test_type_probe_all_failed_is_error() {
        let resolver = Resolver::new(MockLookupBackend::tmdb(), options(false));
        let err = resolver
            .resolve(&LookupRequest::new("Gone").with_stored(Some(9), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_type_mismatch_searches_again() {
        let backend = MockLookupBackend::tmdb().with_results(vec![fixtures::candidate(
            2316,
            MediaType::Tv,
            "The Office",
            "2005-03-24",
            4000,
        )]);
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(
                &LookupRequest::new("The Office")
                    .with_year(Some(2005))
                    .with_stored(Some(999), Some(MediaType::Movie))
                    .expecting(Some(MediaType::Tv)),
            )
            .await
            .unwrap();

        assert_eq!(
            resolution.reference().unwrap(),
            &ResolvedReference::new(2316, MediaType::Tv, Confidence::Exact)
        );
    }

    #[tokio::test]
    async fn test_type_mismatch_keeps_stored_id_when_search_is_empty() {
        let resolver = Resolver::new(MockLookupBackend::tmdb(), options(false));

        let resolution = resolver
            .resolve(
                &LookupRequest::new("Lost Show")
                    .with_stored(Some(999), Some(MediaType::Movie))
                    .expecting(Some(MediaType::Tv)),
            )
            .await
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Resolved(ResolvedReference::new(999, MediaType::Movie, Confidence::Exact))
        );
        assert_eq!(resolver.backend().search_count(), 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_prompts_even_with_exact_match() {
        let backend = MockLookupBackend::tmdb().with_results(vec![
            fixtures::candidate(2316, MediaType::Tv, "The Office", "2005-03-24", 4000),
            fixtures::candidate(5000, MediaType::Tv, "The Office Mix", "2005-01-01", 200),
        ]);
        let pick = backend.results()[1].clone();
        let selector = Arc::new(ScriptedSelector::new(vec![Selection::Selected(pick)]));
        let resolver = Resolver::new(backend, options(true)).with_selector(selector.clone());

        let resolution = resolver
            .resolve(
                &LookupRequest::new("The Office")
                    .with_year(Some(2005))
                    .with_stored(Some(999), Some(MediaType::Movie))
                    .expecting(Some(MediaType::Tv)),
            )
            .await
            .unwrap();

        assert_eq!(resolution.reference().unwrap().provider_id, 5000);
        assert_eq!(selector.call_count(), 1);
    }

    #[tokio::test]
    async fn test_force_ignores_stored_id() {
        let resolver = Resolver::new(
            guardians_backend(),
            ResolverOptions {
                force: true,
                ..ResolverOptions::default()
            },
        );

        let resolution = resolver
            .resolve(
                &LookupRequest::new("Guardians")
                    .with_year(Some(2017))
                    .with_stored(Some(1), Some(MediaType::Movie)),
            )
            .await
            .unwrap();
        assert_eq!(resolution.reference().unwrap().provider_id, 2);
    }

    #[tokio::test]
    async fn test_external_id_short_circuits_search() {
        let backend = guardians_backend().with_external_id(
            "tt3896198",
            ResolvedReference::new(283995, MediaType::Movie, Confidence::Exact),
        );
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(&LookupRequest::new("GotG2").with_external_id(Some("tt3896198".to_string())))
            .await
            .unwrap();

        assert_eq!(resolution.reference().unwrap().provider_id, 283995);
        assert_eq!(resolver.backend().search_count(), 0);
    }

    #[tokio::test]
    async fn test_external_id_failure_falls_back_to_search() {
        let backend = guardians_backend();
        backend.fail_next_external_lookup(ProviderError::rate_limited(Provider::Tmdb));
        let resolver = Resolver::new(backend, options(false));

        let resolution = resolver
            .resolve(
                &LookupRequest::new("Guardians")
                    .with_year(Some(2017))
                    .with_external_id(Some("tt0000001".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(resolution.reference().unwrap().provider_id, 2);
        assert_eq!(resolver.backend().search_count(), 1);
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let backend = guardians_backend();
        backend.fail_next_search(ProviderError::rate_limited(Provider::Tmdb));
        let resolver = Resolver::new(backend, options(false));

        let err = resolver.resolve(&LookupRequest::new("Guardians")).await.unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn test_interactive_without_selector_behaves_non_interactively() {
        let resolver = Resolver::new(guardians_backend(), options(true));
        let resolution = resolver
            .resolve(&LookupRequest::new("Guardians of the Galaxy").with_year(Some(2017)))
            .await
            .unwrap();
        assert_eq!(resolution.reference().unwrap().confidence, Confidence::Heuristic);
    }
}
