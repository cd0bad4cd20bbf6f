//! Testing utilities and mock implementations.
//!
//! Mocks for the seams the enrichment pipeline talks through (lookup
//! backends, interactive selectors, image sources), so resolver and pipeline
//! behavior can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use marginalia_core::testing::{fixtures, MockLookupBackend, ScriptedSelector};
//! use marginalia_core::resolver::{Resolver, ResolverOptions, Selection};
//!
//! let backend = MockLookupBackend::tmdb()
//!     .with_results(vec![fixtures::candidate(1, MediaType::Movie, "Heat", "1995-12-15", 9000)]);
//! let resolver = Resolver::new(backend, ResolverOptions::default())
//!     .with_selector(Arc::new(ScriptedSelector::new(vec![Selection::Skipped])));
//! ```

mod mock_image_source;
mod mock_lookup;
mod mock_selector;

pub use mock_image_source::MockImageSource;
pub use mock_lookup::MockLookupBackend;
pub use mock_selector::{RecordedPrompt, ScriptedSelector};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use crate::enrichment::MovieRecord;
    use crate::provider::{MediaType, SearchCandidate};

    /// Search candidate; pass an empty `date` for "unknown".
    pub fn candidate(
        id: u64,
        media_type: MediaType,
        title: &str,
        date: &str,
        vote_count: u32,
    ) -> SearchCandidate {
        let mut candidate = SearchCandidate::new(id, media_type, title);
        if !date.is_empty() {
            candidate.release_date = Some(date.to_string());
        }
        candidate.vote_count = vote_count;
        candidate.vote_average = 7.0;
        candidate
    }

    pub fn movie_record(title: &str, year: Option<i32>, imdb_id: Option<&str>) -> MovieRecord {
        let mut record = MovieRecord::new(title, year);
        record.imdb_id = imdb_id.map(str::to_string);
        record
    }

    /// PNG-encoded solid image of the given size.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("encoding an in-memory PNG cannot fail");
        buffer.into_inner()
    }
}
