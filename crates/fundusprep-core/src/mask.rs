//! Adaptive eye-region mask extraction
//!
//! Derives a binary mask separating the photographed eye from the
//! surrounding background via edge detection, contour tracing and
//! convex hull rasterization, with bounded threshold relaxation when a
//! first pass does not cover enough of the frame.

use crate::config;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::drawing::draw_polygon_mut;
use imageproc::edges::canny;
use imageproc::filter::median_filter;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Side length of the reduced working copy used for contour discovery.
/// Downsizing discards fine chromatic noise while preserving the
/// large-scale eye contour geometry.
pub const WORK_SIZE: u32 = 256;

/// Minimum foreground fraction at which segmentation is accepted.
pub const COVERAGE_TARGET: f64 = 0.41;

/// Maximum number of outer segmentation attempts.
pub const MAX_ATTEMPTS: u32 = 3;

/// Fixed seed for the salt-and-pepper injection so mask extraction is
/// reproducible run to run.
const NOISE_SEED: u64 = 12345;

/// Result of mask extraction.
#[derive(Debug, Clone)]
pub struct MaskOutcome {
    /// Binary eye-region mask at the source image's resolution
    pub mask: GrayImage,

    /// Foreground pixel fraction of the working-resolution mask
    pub coverage: f64,

    /// Number of outer attempts performed (1-3); 0 when segmentation
    /// was skipped and the mask is a synthetic full-coverage one
    pub attempts: u32,
}

impl MaskOutcome {
    /// Whether the coverage convergence target was reached.
    pub fn converged(&self) -> bool {
        self.coverage >= COVERAGE_TARGET
    }
}

/// Build the denoised, reduced-resolution working copy of an image.
///
/// Resizes down to a 256x256 luma image, injects a small fraction of
/// extreme-value pixels, then suppresses them (together with real
/// high-frequency sensor noise) with a 3x3 median filter. The caller's
/// image is left untouched.
pub fn working_copy(image: &RgbImage) -> GrayImage {
    let reduced = imageops::resize(image, WORK_SIZE, WORK_SIZE, FilterType::Triangle);
    let mut gray = imageops::grayscale(&reduced);

    add_salt_and_pepper(&mut gray);

    median_filter(&gray, 1, 1)
}

/// Replace a fraction of pixels with extreme values at seeded-random
/// positions.
fn add_salt_and_pepper(image: &mut GrayImage) {
    let fraction = config::pipeline_config_handle()
        .config
        .defaults
        .salt_pepper_fraction;

    let (width, height) = image.dimensions();
    let count = (width as f32 * height as f32 * fraction) as u32;

    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    for _ in 0..count {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let value = if rng.gen_bool(0.5) { 255 } else { 0 };
        image.put_pixel(x, y, Luma([value]));
    }
}

/// Extract the eye-region mask of an image.
///
/// Runs up to [`MAX_ATTEMPTS`] outer attempts. Attempt 0 uses
/// `initial_threshold`, decrementing it while no contour at all is
/// found; later attempts force the permissive retry threshold to
/// maximize recall. Never fails: if no usable contour is ever found
/// the returned mask is simply (close to) all-background and the
/// caller decides what a zero-coverage mask means for it.
pub fn extract_mask(image: &RgbImage, initial_threshold: u8) -> MaskOutcome {
    let (orig_width, orig_height) = image.dimensions();
    let work = working_copy(image);

    let retry_threshold = config::pipeline_config_handle()
        .config
        .defaults
        .retry_edge_threshold;

    let mut threshold = initial_threshold;
    let mut mask = GrayImage::new(WORK_SIZE, WORK_SIZE);
    let mut coverage = 0.0;
    let mut attempts = 0;

    for attempt in 0..MAX_ATTEMPTS {
        attempts = attempt + 1;

        let mut hulls = eye_contour_hulls(&work, if attempt == 0 { threshold } else { retry_threshold });

        if attempt == 0 {
            // Relax the threshold until anything shows up at all
            while hulls.is_empty() && threshold > 0 {
                threshold -= 1;
                hulls = eye_contour_hulls(&work, threshold);
            }
        }

        mask = fill_hulls(&hulls);
        coverage = coverage_ratio(&mask);

        crate::verbose_println!(
            "[MASK] attempt {} threshold {} -> coverage {:.4}",
            attempt,
            if attempt == 0 { threshold } else { retry_threshold },
            coverage
        );

        if coverage >= COVERAGE_TARGET {
            break;
        }
    }

    // Area-weighted interpolation back to the original resolution keeps
    // the foreground boundary soft instead of jagged.
    let mask = imageops::resize(&mask, orig_width, orig_height, FilterType::Triangle);

    MaskOutcome {
        mask,
        coverage,
        attempts,
    }
}

/// Detect edges at the given sensitivity and return the convex hull of
/// every discovered contour.
fn eye_contour_hulls(work: &GrayImage, threshold: u8) -> Vec<Vec<Point<i32>>> {
    let low = threshold as f32;
    let edges = canny(work, low, low * 2.0);

    find_contours::<i32>(&edges)
        .into_iter()
        .filter(|contour| contour.points.len() >= 3)
        .map(|contour| convex_hull(contour.points))
        .filter(|hull| hull.len() >= 3)
        .collect()
}

/// Rasterize the union of convex hulls as a filled binary mask at
/// working resolution.
fn fill_hulls(hulls: &[Vec<Point<i32>>]) -> GrayImage {
    let mut mask = GrayImage::new(WORK_SIZE, WORK_SIZE);
    for hull in hulls {
        draw_polygon_mut(&mut mask, hull, Luma([255u8]));
    }
    mask
}

/// Foreground pixel fraction of a mask. Returns 0.0 for an empty image.
pub fn coverage_ratio(mask: &GrayImage) -> f64 {
    let total = mask.width() as u64 * mask.height() as u64;
    if total == 0 {
        return 0.0;
    }

    let foreground = mask.pixels().filter(|p| p[0] > 0).count();
    foreground as f64 / total as f64
}

/// A mask that selects every pixel, used when segmentation is disabled.
pub fn full_coverage_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([255u8]))
}
