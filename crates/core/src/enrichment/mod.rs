//! Importer-side enrichment of records.
//!
//! Movie and series records go through a two-stage run (OMDB for ratings
//! and plot, TMDB for identity, type metadata and covers). Game records are
//! resolved and filled from the Steam store.

mod combinator;
mod merge;
mod movie;
mod steam;
mod tmdb;

pub use combinator::{EnrichError, EnrichmentOutcome, EnrichmentReport, TwoStageEnrichment};
pub use merge::{fill_text, FillEmpty};
pub use movie::{
    apply_omdb, apply_tmdb, BatchSummary, ItemWarning, MovieEnrichOptions, MovieEnricher,
    MovieRecord,
};
pub use steam::{apply_app_details, GameRecord, SteamEnrichOptions, SteamEnricher};
pub use tmdb::{TmdbEnrichOptions, TmdbEnricher, TmdbEnrichment};
