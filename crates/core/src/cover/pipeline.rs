//! Cover download, cache and placement.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::resize::{resize_to_jpeg, write_atomic};
use super::CoverError;
use crate::provider::{HttpClient, MediaType, ProviderError};

/// Anything that can hand out image bytes for a URL.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

#[async_trait]
impl ImageSource for HttpClient {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.get_bytes(url).await
    }
}

/// Cover processing settings.
#[derive(Debug, Clone)]
pub struct CoverOptions {
    pub max_width: u32,
    pub jpeg_quality: u8,
    /// Shared development cache of resized covers.
    pub cache_dir: Option<PathBuf>,
    /// Overwrite covers that already exist at the destination.
    pub update_existing: bool,
}

impl Default for CoverOptions {
    fn default() -> Self {
        Self {
            max_width: 1000,
            jpeg_quality: 85,
            cache_dir: None,
            update_existing: false,
        }
    }
}

/// One cover to acquire.
#[derive(Debug, Clone)]
pub struct CoverRequest<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub media_type: MediaType,
    pub provider_id: u64,
    /// Directory the cover file is placed in.
    pub dest_dir: &'a Path,
    /// Directory of the note that links the cover, for the relative path.
    pub note_dir: Option<&'a Path>,
}

/// Where a cover ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverAsset {
    /// A network download happened for this request.
    pub downloaded: bool,
    pub local_path: PathBuf,
    /// Path relative to the note directory, when one was given.
    pub relative_path: Option<PathBuf>,
    pub filename: String,
}

/// Downloads, resizes and places cover images.
#[derive(Clone)]
pub struct CoverPipeline {
    source: Arc<dyn ImageSource>,
    options: CoverOptions,
}

impl CoverPipeline {
    pub fn new(source: Arc<dyn ImageSource>, options: CoverOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &CoverOptions {
        &self.options
    }

    /// Make sure the cover for `request` exists at its destination.
    pub async fn ensure_cover(&self, request: &CoverRequest<'_>) -> Result<CoverAsset, CoverError> {
        let filename = cover_filename(request.title);
        let dest = request.dest_dir.join(&filename);

        let downloaded = match &self.options.cache_dir {
            Some(cache_dir) => self.place_from_cache(cache_dir, request, &dest).await?,
            None => self.place_direct(request, &dest).await?,
        };

        let relative = request
            .note_dir
            .and_then(|note_dir| relative_path(note_dir, &dest));

        Ok(CoverAsset {
            downloaded,
            local_path: dest,
            relative_path: relative,
            filename,
        })
    }

    async fn place_from_cache(
        &self,
        cache_dir: &Path,
        request: &CoverRequest<'_>,
        dest: &Path,
    ) -> Result<bool, CoverError> {
        let cached = cache_dir.join(cache_filename(request.media_type, request.provider_id));

        if tokio::fs::try_exists(&cached).await? {
            debug!(path = %cached.display(), "Cover cache hit");

            if tokio::fs::try_exists(dest).await? && !self.options.update_existing {
                debug!(path = %dest.display(), "Cover already present, not copying");
                return Ok(false);
            }

            copy_file(&cached, dest).await?;
            return Ok(false);
        }

        debug!(path = %cached.display(), "Cover cache miss");
        self.download_resized(request.url, &cached).await?;
        info!(title = request.title, path = %cached.display(), "Downloaded cover into cache");

        copy_file(&cached, dest).await?;
        Ok(true)
    }

    async fn place_direct(&self, request: &CoverRequest<'_>, dest: &Path) -> Result<bool, CoverError> {
        if tokio::fs::try_exists(dest).await? && !self.options.update_existing {
            debug!(path = %dest.display(), "Cover already present, skipping download");
            return Ok(false);
        }

        self.download_resized(request.url, dest).await?;
        info!(title = request.title, path = %dest.display(), "Downloaded cover");
        Ok(true)
    }

    async fn download_resized(&self, url: &str, path: &Path) -> Result<(), CoverError> {
        let bytes = self.source.fetch_image(url).await?;

        let max_width = self.options.max_width;
        let quality = self.options.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || resize_to_jpeg(&bytes, max_width, quality))
            .await
            .map_err(|e| CoverError::Task(e.to_string()))??;

        write_atomic(path, &encoded).await?;
        Ok(())
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), CoverError> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await?;
    Ok(())
}

/// Replace characters that are invalid in file names on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// `"{title} - cover.jpg"` with the title sanitized.
pub fn cover_filename(title: &str) -> String {
    format!("{} - cover.jpg", sanitize_filename(title))
}

/// `"{media_type}_{id}.jpg"`
pub fn cache_filename(media_type: MediaType, provider_id: u64) -> String {
    format!("{}_{}.jpg", media_type, provider_id)
}

/// `target` expressed relative to `base`. Both must be absolute or both
/// relative; returns `None` otherwise.
pub fn relative_path(base: &Path, target: &Path) -> Option<PathBuf> {
    if base.is_absolute() != target.is_absolute() {
        return None;
    }

    let base: Vec<Component<'_>> = base.components().filter(|c| *c != Component::CurDir).collect();
    let target: Vec<Component<'_>> = target.components().filter(|c| *c != Component::CurDir).collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    // A base that climbs above the common prefix cannot be expressed.
    if base[common..].iter().any(|c| *c == Component::ParentDir) {
        return None;
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    Some(relative)
}
