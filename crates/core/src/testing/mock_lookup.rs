//! Mock lookup backend for resolver tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{MediaType, Provider, ProviderError, SearchCandidate};
use crate::resolver::{LookupBackend, ResolvedReference, SearchQuery, TypeSignals};

/// Mock implementation of [`LookupBackend`].
///
/// - returns the configured results for every search (truncated to the limit)
/// - answers type probes from a `(id, type)` table; unknown pairs fail with
///   `NotFound`
/// - counts searches and probes
/// - can fail the next search or external-ID lookup
#[derive(Debug)]
pub struct MockLookupBackend {
    provider: Provider,
    probe_types: Vec<MediaType>,
    matches_year: bool,
    results: Vec<SearchCandidate>,
    signals: HashMap<(u64, MediaType), TypeSignals>,
    external_ids: HashMap<String, ResolvedReference>,
    searches: AtomicUsize,
    probes: AtomicUsize,
    queries: Mutex<Vec<String>>,
    next_search_error: Mutex<Option<ProviderError>>,
    next_external_error: Mutex<Option<ProviderError>>,
}

impl MockLookupBackend {
    pub fn new(provider: Provider, probe_types: Vec<MediaType>) -> Self {
        Self {
            provider,
            probe_types,
            matches_year: true,
            results: Vec::new(),
            signals: HashMap::new(),
            external_ids: HashMap::new(),
            searches: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            next_search_error: Mutex::new(None),
            next_external_error: Mutex::new(None),
        }
    }

    /// Movie/TV backend shaped like TMDB.
    pub fn tmdb() -> Self {
        Self::new(Provider::Tmdb, vec![MediaType::Movie, MediaType::Tv])
    }

    /// Game backend shaped like Steam: candidates have no year.
    pub fn steam() -> Self {
        Self {
            matches_year: false,
            ..Self::new(Provider::Steam, vec![MediaType::Game])
        }
    }

    pub fn with_results(mut self, results: Vec<SearchCandidate>) -> Self {
        self.results = results;
        self
    }

    pub fn with_signals(mut self, id: u64, media_type: MediaType, signals: TypeSignals) -> Self {
        self.signals.insert((id, media_type), signals);
        self
    }

    pub fn with_external_id(mut self, external_id: &str, reference: ResolvedReference) -> Self {
        self.external_ids.insert(external_id.to_string(), reference);
        self
    }

    pub fn results(&self) -> &[SearchCandidate] {
        &self.results
    }

    pub fn fail_next_search(&self, error: ProviderError) {
        *self.next_search_error.lock().unwrap() = Some(error);
    }

    pub fn fail_next_external_lookup(&self, error: ProviderError) {
        *self.next_external_error.lock().unwrap() = Some(error);
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Titles searched so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LookupBackend for MockLookupBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn probe_types(&self) -> &[MediaType] {
        &self.probe_types
    }

    fn matches_year(&self) -> bool {
        self.matches_year
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<ResolvedReference>, ProviderError> {
        if let Some(error) = self.next_external_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.external_ids.get(external_id).copied())
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchCandidate>, ProviderError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.title.to_string());

        if let Some(error) = self.next_search_error.lock().unwrap().take() {
            return Err(error);
        }

        Ok(self.results.iter().take(query.limit).cloned().collect())
    }

    async fn type_signals(&self, id: u64, media_type: MediaType) -> Result<TypeSignals, ProviderError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.signals
            .get(&(id, media_type))
            .copied()
            .ok_or_else(|| ProviderError::NotFound(format!("{} {}", media_type, id)))
    }
}
