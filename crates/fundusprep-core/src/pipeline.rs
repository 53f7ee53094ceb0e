//! Image processing pipeline
//!
//! Sequences the preprocessing stages for one photograph: eye-region
//! segmentation, reference-driven histogram specification, background
//! blackout, adaptive luminance enhancement and the optional final
//! resize. The ordering is load-bearing: masking restricts which pixels
//! drive the histogram statistics, and enhancement operates on the
//! already color-corrected image.

use crate::clahe::{self, ClaheParams};
use crate::color;
use crate::decoders::DecodedImage;
use crate::histspec::HistogramModel;
use crate::mask::{self, MaskOutcome};
use crate::models::BatchOptions;
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};

/// Reference-side state shared read-only by every item in a batch.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    /// Histogram model built from the reference's foreground pixels
    pub model: HistogramModel,

    /// Eye-region mask of the reference image
    pub mask: GrayImage,

    /// Coverage ratio of the reference mask
    pub coverage: f64,
}

/// Result of the processing pipeline for one item
#[derive(Debug, Clone)]
pub struct ProcessedItem {
    /// Color-corrected, enhanced image
    pub image: RgbImage,

    /// Eye-region mask, dimensioned identically to `image`
    pub mask: GrayImage,
}

/// Mask an image per the batch options: adaptive segmentation when
/// masking is enabled, full coverage (with `attempts` 0, since no
/// segmentation ran) otherwise.
pub fn mask_for(image: &RgbImage, options: &BatchOptions) -> MaskOutcome {
    if options.mask_enabled {
        mask::extract_mask(image, options.edge_threshold)
    } else {
        let (width, height) = image.dimensions();
        MaskOutcome {
            mask: mask::full_coverage_mask(width, height),
            coverage: 1.0,
            attempts: 0,
        }
    }
}

/// Build the shared reference state for a batch run.
///
/// Fails when masking is enabled but the reference segments to an
/// empty mask: a model built from zero pixels could only ever produce
/// identity transforms, so the whole batch would silently be a no-op.
pub fn prepare_reference(
    decoded: &DecodedImage,
    options: &BatchOptions,
) -> Result<ReferenceData, String> {
    let outcome = mask_for(&decoded.pixels, options);

    crate::verbose_println!(
        "[REF] mask coverage {:.4} after {} attempt(s)",
        outcome.coverage,
        outcome.attempts
    );

    if options.mask_enabled && outcome.coverage == 0.0 {
        return Err(format!(
            "Reference image {} produced an empty eye-region mask",
            options.reference.display()
        ));
    }

    let model = HistogramModel::build(&decoded.pixels, &outcome.mask)?;

    Ok(ReferenceData {
        model,
        mask: outcome.mask,
        coverage: outcome.coverage,
    })
}

/// Execute the full per-item pipeline
pub fn process_image(
    decoded: DecodedImage,
    reference: &ReferenceData,
    options: &BatchOptions,
) -> Result<ProcessedItem, String> {
    let DecodedImage {
        width,
        height,
        pixels,
    } = decoded;

    // Step 1: segment the eye region (or take full coverage)
    let outcome = mask_for(&pixels, options);
    let mask = outcome.mask;

    if options.debug {
        crate::verbose_println!(
            "[DEBUG] mask coverage {:.4} after {} attempt(s)",
            outcome.coverage,
            outcome.attempts
        );
    }

    // Step 2: remap colors onto the reference distribution
    let mut corrected = reference.model.apply(&pixels, &mask)?;

    if options.debug {
        let stats = channel_means(&corrected);
        crate::verbose_println!(
            "[DEBUG] after specification - mean R: {:.2}, G: {:.2}, B: {:.2}",
            stats[0],
            stats[1],
            stats[2]
        );
    }

    // Step 3: black out everything outside the eye region so background
    // noise cannot leak into downstream feature statistics
    if options.mask_enabled {
        mask_off_background(&mut corrected, &mask);
    }

    // Step 4: adaptive equalization of the value channel only
    let value = color::value_plane(&corrected);
    let enhanced_value = clahe::equalize_adaptive(&value, &ClaheParams::from_config());
    let enhanced = color::replace_value_plane(&corrected, &enhanced_value)?;

    if options.debug {
        let stats = channel_means(&enhanced);
        crate::verbose_println!(
            "[DEBUG] after enhancement - mean R: {:.2}, G: {:.2}, B: {:.2}",
            stats[0],
            stats[1],
            stats[2]
        );
    }

    // Step 5: optional resize, applied to image and mask in lockstep
    let item = match output_dimensions(width, height, options) {
        Some((out_width, out_height)) => ProcessedItem {
            image: imageops::resize(&enhanced, out_width, out_height, FilterType::Triangle),
            mask: imageops::resize(&mask, out_width, out_height, FilterType::Triangle),
        },
        None => ProcessedItem {
            image: enhanced,
            mask,
        },
    };

    debug_assert_eq!(item.image.dimensions(), item.mask.dimensions());
    Ok(item)
}

/// Set every pixel outside the mask to black.
fn mask_off_background(image: &mut RgbImage, mask: &GrayImage) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] == 0 {
            *pixel = Rgb([0, 0, 0]);
        }
    }
}

/// Final output dimensions, if any resize is requested.
///
/// A fixed square output size takes precedence over the scale divisor;
/// with neither set the dimensions stay unchanged.
fn output_dimensions(width: u32, height: u32, options: &BatchOptions) -> Option<(u32, u32)> {
    if options.output_size > 0 {
        return Some((options.output_size, options.output_size));
    }

    if (options.scale - 1.0).abs() > f32::EPSILON && options.scale > 0.0 {
        let out_width = ((width as f32 / options.scale) as u32).max(1);
        let out_height = ((height as f32 / options.scale) as u32).max(1);
        return Some((out_width, out_height));
    }

    None
}

/// Per-channel mean intensities, for debug output.
fn channel_means(image: &RgbImage) -> [f32; 3] {
    let total = (image.width() as u64 * image.height() as u64).max(1);
    let mut sums = [0u64; 3];

    for pixel in image.pixels() {
        sums[0] += pixel[0] as u64;
        sums[1] += pixel[1] as u64;
        sums[2] += pixel[2] as u64;
    }

    [
        sums[0] as f32 / total as f32,
        sums[1] as f32 / total as f32,
        sums[2] as f32 / total as f32,
    ]
}
