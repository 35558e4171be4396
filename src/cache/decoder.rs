//! Pluggable image decoding.
//!
//! The cache talks to the filesystem only through [`ImageDecoder`], so tests
//! and embedders can substitute their own pixel source.

use std::path::Path;

use crate::error::{EngineError, Result};

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"];

/// Check if a filename has a supported image extension.
pub fn is_image_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A decoded RGBA8 pixel buffer.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Tightly packed RGBA8 pixels, row-major.
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Approximate memory footprint in bytes (4 bytes per pixel).
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Decode collaborator injected into the cache.
pub trait ImageDecoder: Send + Sync {
    /// Decode the file at `path` into RGBA8 pixels.
    fn decode(&self, path: &Path) -> Result<DecodedImage>;

    /// Read image dimensions without a full decode, when the backend can.
    fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        let decoded = self.decode(path)?;
        Ok((decoded.width, decoded.height))
    }
}

/// Default decoder built on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RgbaDecoder;

impl ImageDecoder for RgbaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        log::info!("🖼️ Loading image: {:?}", path);
        let img = image::open(path).map_err(|e| EngineError::decode(path, e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("🖼️ Loaded {}x{} image", width, height);
        Ok(DecodedImage {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|e| EngineError::decode(path, e.to_string()))
    }
}
