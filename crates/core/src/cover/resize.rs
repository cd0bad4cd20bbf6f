//! Image decode, downscale and JPEG encode.

use std::io;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageResult;

/// Decode `bytes`, shrink to `max_width` (aspect ratio kept) when wider, and
/// encode as JPEG. Images already narrow enough are only re-encoded.
pub fn resize_to_jpeg(bytes: &[u8], max_width: u32, quality: u8) -> ImageResult<Vec<u8>> {
    let image = image::load_from_memory(bytes)?;

    let image = if image.width() > max_width {
        image.resize(max_width, u32::MAX, FilterType::Lanczos3)
    } else {
        image
    };

    let rgb = image.to_rgb8();
    let mut encoded = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, quality);
        encoder.encode_image(&rgb)?;
    }
    Ok(encoded)
}

/// Write through a temporary sibling file and rename, so readers never see a
/// partial image.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".part");
    let temp = std::path::PathBuf::from(temp);

    tokio::fs::write(&temp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::png_bytes;
    use image::GenericImageView;
    use tempfile::TempDir;

    #[test]
    fn test_wide_image_is_downscaled() {
        let jpeg = resize_to_jpeg(&png_bytes(2000, 1000), 1000, 85).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (1000, 500));
        assert_eq!(
            image::guess_format(&jpeg).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_narrow_image_keeps_size() {
        let jpeg = resize_to_jpeg(&png_bytes(300, 450), 1000, 85).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (300, 450));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(resize_to_jpeg(b"definitely not an image", 1000, 85).is_err());
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("cover.jpg");

        write_atomic(&path, b"data").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"data");
        assert!(!dir.path().join("a/b/cover.jpg.part").exists());
    }
}
