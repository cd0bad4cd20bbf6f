//! Types for provider ID resolution.

use serde::{Deserialize, Serialize};

use crate::provider::{MediaType, SearchCandidate};

/// How a reference was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Stored ID, external-ID lookup, or a unique exact title/year match.
    Exact,
    /// Single surviving candidate or first-ranked fallback.
    Heuristic,
    /// Picked by the user from an interactive prompt.
    UserChosen,
}

/// A resolved provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub provider_id: u64,
    pub media_type: MediaType,
    pub confidence: Confidence,
}

impl ResolvedReference {
    pub fn new(provider_id: u64, media_type: MediaType, confidence: Confidence) -> Self {
        Self {
            provider_id,
            media_type,
            confidence,
        }
    }

    pub fn from_candidate(candidate: &SearchCandidate, confidence: Confidence) -> Self {
        Self::new(candidate.id, candidate.media_type, confidence)
    }
}

/// Outcome of a resolution that did not fail.
///
/// A user stop is not a resolution outcome; it surfaces as
/// [`ProviderError::StopRequested`](crate::provider::ProviderError::StopRequested).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedReference),
    /// Nothing usable (no results, or the user skipped the item).
    Unresolved,
}

impl Resolution {
    pub fn reference(&self) -> Option<&ResolvedReference> {
        match self {
            Resolution::Resolved(reference) => Some(reference),
            Resolution::Unresolved => None,
        }
    }

    pub fn into_reference(self) -> Option<ResolvedReference> {
        match self {
            Resolution::Resolved(reference) => Some(reference),
            Resolution::Unresolved => None,
        }
    }
}

/// What an interactive selector returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Selected(SearchCandidate),
    Skipped,
    Stopped,
}

/// Everything known about the item being resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupRequest {
    pub title: String,
    pub year: Option<i32>,
    /// IMDb ID or similar cross-provider identifier.
    pub external_id: Option<String>,
    /// ID recorded by a previous run.
    pub stored_id: Option<u64>,
    pub stored_media_type: Option<MediaType>,
    /// Type the caller expects (e.g. `Tv` when importing a series list).
    pub expected_media_type: Option<MediaType>,
}

impl LookupRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn with_stored(mut self, id: Option<u64>, media_type: Option<MediaType>) -> Self {
        self.stored_id = id;
        self.stored_media_type = media_type;
        self
    }

    pub fn expecting(mut self, media_type: Option<MediaType>) -> Self {
        self.expected_media_type = media_type;
        self
    }
}

/// Parameters of a provider search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery<'a> {
    pub title: &'a str,
    pub year: Option<i32>,
    pub limit: usize,
}

/// Resolver tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Ask the selector when the choice is ambiguous.
    pub interactive: bool,
    /// Ignore stored IDs and search again.
    pub force: bool,
    pub min_vote_count: u32,
    pub search_limit: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            interactive: false,
            force: false,
            min_vote_count: 100,
            search_limit: 10,
        }
    }
}

/// Evidence about whether an ID is of a given type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeSignals {
    /// Type-specific field present (runtime for movies, episodes for TV).
    pub strong: bool,
    pub genre_count: usize,
}

impl TypeSignals {
    pub fn score(&self) -> u32 {
        let mut score = 0;
        if self.strong {
            score += 10;
        }
        if self.genre_count > 0 {
            score += 1;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_signal_score() {
        assert_eq!(TypeSignals::default().score(), 0);
        assert_eq!(
            TypeSignals {
                strong: false,
                genre_count: 3
            }
            .score(),
            1
        );
        assert_eq!(
            TypeSignals {
                strong: true,
                genre_count: 2
            }
            .score(),
            11
        );
    }

    #[test]
    fn test_request_builder_drops_blank_external_id() {
        let request = LookupRequest::new("Heat")
            .with_year(Some(1995))
            .with_external_id(Some("  ".to_string()));
        assert_eq!(request.external_id, None);
        assert_eq!(request.year, Some(1995));
    }
}
