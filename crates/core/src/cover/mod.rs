//! Cover image acquisition.
//!
//! Downloads a poster, downsizes it, and places it next to the note that
//! references it. An optional shared cache directory keeps one resized copy
//! per `(media type, provider id)` so repeated imports never re-download.

mod pipeline;
mod resize;

pub use pipeline::{
    cache_filename, cover_filename, relative_path, sanitize_filename, CoverAsset, CoverOptions,
    CoverPipeline, CoverRequest, ImageSource,
};
pub use resize::{resize_to_jpeg, write_atomic};

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors for cover acquisition.
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("Failed to download cover: {0}")]
    Download(#[from] ProviderError),

    #[error("Failed to process cover image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cover file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cover processing task failed: {0}")]
    Task(String),
}
