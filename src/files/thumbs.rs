//! Thumbnail rendering for mesh preview images.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::ImageFormat;

/// Bounding box for generated thumbnails.
const THUMB_SIZE: u32 = 300;

/// Decode `bytes`, fit the picture into a 300×300 box preserving aspect
/// ratio (never upscaling), and return it encoded as PNG. Decoding and
/// resizing run on the blocking pool.
///
/// Doubles as the upload-time validity check: undecodable data fails here
/// before anything touches the disk.
pub async fn render_thumbnail(bytes: Vec<u8>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(&bytes).context("unreadable image data")?;
        let thumb = if decoded.width() <= THUMB_SIZE && decoded.height() <= THUMB_SIZE {
            decoded
        } else {
            decoded.resize(THUMB_SIZE, THUMB_SIZE, FilterType::Lanczos3)
        };
        let mut out = Vec::new();
        thumb
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .context("failed to encode thumbnail")?;
        Ok(out)
    })
    .await
    .context("Thumbnail spawn_blocking panicked")?
}

// ============================================================================
// Tests
// ============================================================================
