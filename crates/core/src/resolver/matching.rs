//! Candidate filtering, ordering and exact-match detection.

use crate::provider::{MediaType, SearchCandidate};

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// The single candidate whose normalized title and year both equal the
/// request. Returns `None` when zero or several candidates match.
///
/// A request without a year only matches candidates without a year.
pub fn find_exact_match<'a>(
    candidates: &'a [SearchCandidate],
    title: &str,
    year: Option<i32>,
) -> Option<&'a SearchCandidate> {
    let wanted = normalize_title(title);
    let mut matches = candidates
        .iter()
        .filter(|c| normalize_title(&c.title) == wanted && c.year() == year);

    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first)
}

/// Stable partition: candidates of `media_type` first, relative order kept.
pub fn prioritize_media_type(candidates: Vec<SearchCandidate>, media_type: MediaType) -> Vec<SearchCandidate> {
    let (mut preferred, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.media_type == media_type);
    preferred.extend(rest);
    preferred
}

/// Drop low-vote candidates (unless they have the expected type), then move
/// the expected type to the front.
pub fn filter_candidates(
    candidates: Vec<SearchCandidate>,
    min_vote_count: u32,
    expected: Option<MediaType>,
) -> Vec<SearchCandidate> {
    let kept: Vec<_> = candidates
        .into_iter()
        .filter(|c| c.vote_count >= min_vote_count || Some(c.media_type) == expected)
        .collect();

    match expected {
        Some(media_type) => prioritize_media_type(kept, media_type),
        None => kept,
    }
}
