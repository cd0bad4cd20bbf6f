//! Types shared by the provider clients and the lookup resolver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProviderError;

/// The external services this crate talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Tmdb,
    Omdb,
    Steam,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Tmdb => "tmdb",
            Provider::Omdb => "omdb",
            Provider::Steam => "steam",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of item a provider identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tv,
    Game,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
            MediaType::Game => "game",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            "game" => Ok(MediaType::Game),
            other => Err(ProviderError::InvalidMediaType(other.to_string())),
        }
    }
}

/// One search hit as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: u64,
    pub media_type: MediaType,
    /// Display title (movie title or series name).
    pub title: String,
    /// Release or first-air date, `YYYY-MM-DD` when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_count: u32,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Poster path or thumbnail URL, provider specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl SearchCandidate {
    pub fn new(id: u64, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            id,
            media_type,
            title: title.into(),
            release_date: None,
            vote_count: 0,
            vote_average: 0.0,
            popularity: 0.0,
            runtime_hint: None,
            overview: None,
            image: None,
        }
    }

    /// Year parsed from the leading four characters of the release date.
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .and_then(|year| year.parse().ok())
    }

    /// Human readable label used by interactive selectors.
    pub fn label(&self) -> String {
        match self.year() {
            Some(year) => format!("{} ({}) [{}]", self.title, year, self.media_type),
            None => format!("{} [{}]", self.title, self.media_type),
        }
    }
}

/// Type information for a TMDB item, cached under `metadata_{type}_{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmdbMetadata {
    pub tmdb_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_mins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_episodes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_seasons: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One entry of the OMDB `Ratings` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmdbRating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// OMDB title record. OMDB spells missing values `"N/A"`; the accessor
/// methods hide that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmdbRecord {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Year", default)]
    pub year: String,
    #[serde(rename = "Rated", default)]
    pub rated: String,
    #[serde(rename = "Runtime", default)]
    pub runtime: String,
    #[serde(rename = "Genre", default)]
    pub genre: String,
    #[serde(rename = "Director", default)]
    pub director: String,
    #[serde(rename = "Actors", default)]
    pub actors: String,
    #[serde(rename = "Plot", default)]
    pub plot: String,
    #[serde(rename = "Poster", default)]
    pub poster: String,
    #[serde(rename = "Metascore", default)]
    pub metascore: String,
    #[serde(rename = "imdbRating", default)]
    pub imdb_rating: String,
    #[serde(rename = "imdbID", default)]
    pub imdb_id: String,
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Ratings", default)]
    pub ratings: Vec<OmdbRating>,
}

fn present(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("N/A") {
        None
    } else {
        Some(value)
    }
}

impl OmdbRecord {
    pub fn plot(&self) -> Option<&str> {
        present(&self.plot)
    }

    pub fn imdb_id(&self) -> Option<&str> {
        present(&self.imdb_id)
    }

    pub fn poster_url(&self) -> Option<&str> {
        present(&self.poster)
    }

    /// `"136 min"` -> `136`.
    pub fn runtime_minutes(&self) -> Option<u32> {
        present(&self.runtime)?.split_whitespace().next()?.parse().ok()
    }

    pub fn imdb_rating(&self) -> Option<f32> {
        present(&self.imdb_rating)?.parse().ok()
    }

    pub fn metascore(&self) -> Option<u32> {
        present(&self.metascore)?.parse().ok()
    }

    pub fn genres(&self) -> Vec<String> {
        split_list(&self.genre)
    }

    pub fn directors(&self) -> Vec<String> {
        split_list(&self.director)
    }

    pub fn actors(&self) -> Vec<String> {
        split_list(&self.actors)
    }

    pub fn rotten_tomatoes(&self) -> Option<&str> {
        self.ratings
            .iter()
            .find(|r| r.source == "Rotten Tomatoes")
            .and_then(|r| present(&r.value))
    }
}

fn split_list(value: &str) -> Vec<String> {
    match present(value) {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Store page details for a Steam application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteamAppDetails {
    pub app_id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metacritic_score: Option<u32>,
}
