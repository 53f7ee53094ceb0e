//! Histogram specification engine
//!
//! Remaps the per-channel color distribution of a target image to match
//! a reference image's distribution, restricted to masked pixels. The
//! reference side is captured once per batch in a [`HistogramModel`]
//! and shared read-only across all targets.

use image::{GrayImage, RgbImage};

/// Number of intensity bins per channel.
const NUM_BINS: usize = 256;

/// Per-channel cumulative distribution of a reference image's
/// foreground pixels. Built once, read-only thereafter.
#[derive(Debug, Clone)]
pub struct HistogramModel {
    /// Normalized cumulative histograms for R, G, B
    cdfs: [[f32; NUM_BINS]; 3],

    /// Number of foreground pixels the model was built from
    samples: u64,
}

impl HistogramModel {
    /// Build the model from a reference image and its mask.
    ///
    /// Only pixels selected by the mask contribute; a zero-foreground
    /// mask produces a model whose [`apply`](Self::apply) is the
    /// identity transform.
    pub fn build(reference: &RgbImage, mask: &GrayImage) -> Result<Self, String> {
        if reference.dimensions() != mask.dimensions() {
            return Err(format!(
                "Reference dimensions {:?} do not match mask dimensions {:?}",
                reference.dimensions(),
                mask.dimensions()
            ));
        }

        let (histograms, samples) = masked_histograms(reference, mask);
        let cdfs = [
            normalized_cdf(&histograms[0], samples),
            normalized_cdf(&histograms[1], samples),
            normalized_cdf(&histograms[2], samples),
        ];

        Ok(Self { cdfs, samples })
    }

    /// Number of foreground pixels the model was built from.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Remap a target image's channels to follow the reference
    /// distribution.
    ///
    /// For each channel independently: a masked pixel's intensity is
    /// looked up in the target's own masked cumulative distribution and
    /// replaced with the reference inverse CDF at the same cumulative
    /// probability. Pixels outside the target mask pass through
    /// unchanged. Pure function of its inputs.
    pub fn apply(&self, target: &RgbImage, mask: &GrayImage) -> Result<RgbImage, String> {
        if target.dimensions() != mask.dimensions() {
            return Err(format!(
                "Target dimensions {:?} do not match mask dimensions {:?}",
                target.dimensions(),
                mask.dimensions()
            ));
        }

        // With no reference or no target foreground there is nothing to
        // match against; the transform degenerates to identity.
        if self.samples == 0 {
            return Ok(target.clone());
        }

        let (histograms, samples) = masked_histograms(target, mask);
        if samples == 0 {
            return Ok(target.clone());
        }

        let luts: [[u8; NUM_BINS]; 3] = [
            matching_lut(&normalized_cdf(&histograms[0], samples), &self.cdfs[0]),
            matching_lut(&normalized_cdf(&histograms[1], samples), &self.cdfs[1]),
            matching_lut(&normalized_cdf(&histograms[2], samples), &self.cdfs[2]),
        ];

        let mut out = target.clone();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            if mask.get_pixel(x, y)[0] > 0 {
                pixel[0] = luts[0][pixel[0] as usize];
                pixel[1] = luts[1][pixel[1] as usize];
                pixel[2] = luts[2][pixel[2] as usize];
            }
        }

        Ok(out)
    }
}

/// Per-channel intensity histograms over mask-selected pixels, plus the
/// number of pixels counted.
fn masked_histograms(image: &RgbImage, mask: &GrayImage) -> ([[u32; NUM_BINS]; 3], u64) {
    let mut histograms = [[0u32; NUM_BINS]; 3];
    let mut samples = 0u64;

    for (pixel, selector) in image.pixels().zip(mask.pixels()) {
        if selector[0] > 0 {
            histograms[0][pixel[0] as usize] += 1;
            histograms[1][pixel[1] as usize] += 1;
            histograms[2][pixel[2] as usize] += 1;
            samples += 1;
        }
    }

    (histograms, samples)
}

/// Monotonic cumulative distribution normalized to end at 1.0.
fn normalized_cdf(histogram: &[u32; NUM_BINS], samples: u64) -> [f32; NUM_BINS] {
    let mut cdf = [0.0f32; NUM_BINS];
    if samples == 0 {
        return cdf;
    }

    let mut running = 0u64;
    for (bin, &count) in histogram.iter().enumerate() {
        running += count as u64;
        cdf[bin] = running as f32 / samples as f32;
    }
    cdf
}

/// Classical histogram-matching lookup table: each target intensity is
/// mapped to the smallest reference intensity whose cumulative
/// probability reaches the target's.
fn matching_lut(target_cdf: &[f32; NUM_BINS], reference_cdf: &[f32; NUM_BINS]) -> [u8; NUM_BINS] {
    let mut lut = [0u8; NUM_BINS];
    let mut j = 0usize;

    for (v, entry) in lut.iter_mut().enumerate() {
        let p = target_cdf[v];
        while j < NUM_BINS - 1 && reference_cdf[j] < p {
            j += 1;
        }
        *entry = j as u8;
    }

    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::full_coverage_mask;
    use image::Rgb;

    /// Horizontal gradient so every intensity occurs.
    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let v = (x * 255 / (width - 1).max(1)) as u8;
            Rgb([v, v, v])
        })
    }

    /// Gradient with a dark-heavy (quadratic) intensity profile.
    fn dark_heavy_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let t = x as f32 / (width - 1).max(1) as f32;
            let v = (t * t * 255.0).round() as u8;
            Rgb([v, v, v])
        })
    }

    /// Smallest intensity whose cumulative probability reaches `q`.
    fn quantile(cdf: &[f32; NUM_BINS], q: f32) -> usize {
        cdf.iter().position(|&p| p >= q).unwrap_or(NUM_BINS - 1)
    }

    #[test]
    fn test_self_match_is_identity() {
        let img = gradient_image(256, 32);
        let mask = full_coverage_mask(256, 32);

        let model = HistogramModel::build(&img, &mask).unwrap();
        let out = model.apply(&img, &mask).unwrap();

        assert_eq!(out, img, "matching an image against itself must be exact");
    }

    #[test]
    fn test_output_distribution_follows_reference() {
        let reference = dark_heavy_image(512, 16);
        let target = gradient_image(512, 16);
        let ref_mask = full_coverage_mask(512, 16);
        let target_mask = full_coverage_mask(512, 16);

        let model = HistogramModel::build(&reference, &ref_mask).unwrap();
        let out = model.apply(&target, &target_mask).unwrap();

        let (ref_hists, ref_samples) = masked_histograms(&reference, &ref_mask);
        let (out_hists, out_samples) = masked_histograms(&out, &target_mask);

        for channel in 0..3 {
            let ref_cdf = normalized_cdf(&ref_hists[channel], ref_samples);
            let out_cdf = normalized_cdf(&out_hists[channel], out_samples);

            // Quantiles of the output distribution land within one
            // intensity level of the reference distribution's.
            for q in [0.1, 0.25, 0.5, 0.75, 0.9] {
                let rq = quantile(&ref_cdf, q) as i32;
                let oq = quantile(&out_cdf, q) as i32;
                assert!(
                    (rq - oq).abs() <= 1,
                    "channel {} quantile {} differs: ref {} vs out {}",
                    channel,
                    q,
                    rq,
                    oq
                );
            }
        }
    }

    #[test]
    fn test_background_pixels_pass_through() {
        let reference = dark_heavy_image(64, 64);
        let ref_mask = full_coverage_mask(64, 64);
        let model = HistogramModel::build(&reference, &ref_mask).unwrap();

        let target = gradient_image(64, 64);
        // Left half foreground, right half background
        let target_mask = GrayImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                image::Luma([255u8])
            } else {
                image::Luma([0u8])
            }
        });

        let out = model.apply(&target, &target_mask).unwrap();

        for y in 0..64 {
            for x in 32..64 {
                assert_eq!(
                    out.get_pixel(x, y),
                    target.get_pixel(x, y),
                    "background pixel ({}, {}) was altered",
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_all_background_target_mask_is_identity() {
        let reference = dark_heavy_image(32, 32);
        let ref_mask = full_coverage_mask(32, 32);
        let model = HistogramModel::build(&reference, &ref_mask).unwrap();

        let target = gradient_image(32, 32);
        let empty_mask = GrayImage::new(32, 32);

        let out = model.apply(&target, &empty_mask).unwrap();
        assert_eq!(out, target);
    }

    #[test]
    fn test_empty_reference_mask_is_identity() {
        let reference = dark_heavy_image(32, 32);
        let empty_mask = GrayImage::new(32, 32);

        let model = HistogramModel::build(&reference, &empty_mask).unwrap();
        assert_eq!(model.samples(), 0);

        let target = gradient_image(32, 32);
        let target_mask = full_coverage_mask(32, 32);
        let out = model.apply(&target, &target_mask).unwrap();
        assert_eq!(out, target);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let img = gradient_image(32, 32);
        let wrong_mask = full_coverage_mask(16, 16);

        assert!(HistogramModel::build(&img, &wrong_mask).is_err());

        let model = HistogramModel::build(&img, &full_coverage_mask(32, 32)).unwrap();
        assert!(model.apply(&img, &wrong_mask).is_err());
    }

    #[test]
    fn test_matching_lut_monotonic() {
        let reference = dark_heavy_image(256, 8);
        let target = gradient_image(256, 8);
        let mask = full_coverage_mask(256, 8);

        let (ref_hists, ref_samples) = masked_histograms(&reference, &mask);
        let (tgt_hists, tgt_samples) = masked_histograms(&target, &mask);

        let lut = matching_lut(
            &normalized_cdf(&tgt_hists[0], tgt_samples),
            &normalized_cdf(&ref_hists[0], ref_samples),
        );

        for v in 1..NUM_BINS {
            assert!(lut[v] >= lut[v - 1], "lut not monotonic at {}", v);
        }
    }
}
