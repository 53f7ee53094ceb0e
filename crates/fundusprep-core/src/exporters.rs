//! Image exporters
//!
//! Write processed photographs and their eye-region masks to disk. The
//! output format is chosen from the destination path's extension, so a
//! `.png` path yields PNG output and `.jpg` yields JPEG.

use image::{GrayImage, RgbImage};
use std::path::Path;

/// Save a processed image to the given path.
///
/// The encoder is selected from the file extension. The parent
/// directory must already exist.
pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<(), String> {
    let path = path.as_ref();
    image
        .save(path)
        .map_err(|e| format!("Failed to save image {}: {}", path.display(), e))
}

/// Save an eye-region mask as a single-channel image.
///
/// Masks are binary (0 background, 255 foreground) before any resize;
/// a resized mask may carry intermediate values along its boundary.
pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P) -> Result<(), String> {
    let path = path.as_ref();
    mask.save(path)
        .map_err(|e| format!("Failed to save mask {}: {}", path.display(), e))
}
