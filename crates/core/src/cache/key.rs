//! Deterministic cache key construction.

use std::fmt::Display;

/// Lowercase, collapse whitespace runs to `_` and replace anything outside
/// `[a-z0-9_-]` with `_`.
pub fn normalize_key(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{prefix}_{normalized query}_{year or 0}_{limit}`
pub fn search_key(prefix: &str, query: &str, year: Option<i32>, limit: usize) -> String {
    format!(
        "{}_{}_{}_{}",
        prefix,
        normalize_key(query),
        year.unwrap_or(0),
        limit
    )
}

/// `{prefix}_{id}`
pub fn id_key(prefix: &str, id: impl Display) -> String {
    format!("{}_{}", prefix, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  The   Matrix "), "the_matrix");
        assert_eq!(normalize_key("Spider-Man: No Way Home"), "spider-man__no_way_home");
        assert_eq!(normalize_key("WALL·E"), "wall_e");
    }

    #[test]
    fn test_search_key_is_deterministic() {
        assert_eq!(
            search_key("search", "Blade Runner", Some(1982), 10),
            "search_blade_runner_1982_10"
        );
        assert_eq!(search_key("movies", "Alien", None, 5), "movies_alien_0_5");
        assert_eq!(
            search_key("search", "blade  runner", Some(1982), 10),
            search_key("search", "Blade Runner", Some(1982), 10)
        );
    }

    #[test]
    fn test_id_key() {
        assert_eq!(id_key("movie_full", 603), "movie_full_603");
        assert_eq!(id_key("find_imdb", "tt0133093"), "find_imdb_tt0133093");
    }
}
