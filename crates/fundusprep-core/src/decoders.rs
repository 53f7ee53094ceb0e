//! Image decoders
//!
//! Decodes input photographs into 8-bit RGB buffers for processing.

use image::RgbImage;
use std::path::Path;

/// Supported input file extensions (lower case).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// Decoded image data
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// 8-bit RGB pixel data
    pub pixels: RgbImage,
}

impl DecodedImage {
    /// Wrap an already-decoded RGB buffer.
    pub fn from_rgb(pixels: RgbImage) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Check whether a file extension names a decodable image format.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Decode an image from a file path
pub fn decode_image<P: AsRef<Path>>(path: P) -> Result<DecodedImage, String> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| format!("No file extension found: {}", path.display()))?;

    if !is_supported_extension(&extension) {
        return Err(format!("Unsupported file format: {}", extension));
    }

    let decoded = image::open(path)
        .map_err(|e| format!("Failed to decode {}: {}", path.display(), e))?;

    // Alpha and 16-bit sources are flattened to 8-bit RGB; the pipeline
    // operates on 3 channels at 8-bit depth throughout.
    Ok(DecodedImage::from_rgb(decoded.to_rgb8()))
}
