//! Contrast-limited adaptive histogram equalization
//!
//! Tile-local equalization of a single-channel image. Each tile's
//! histogram is clipped before its CDF is built, bounding how much any
//! single intensity bin may be amplified, and the per-tile transforms
//! are blended with bilinear interpolation so tile seams do not show.

use image::GrayImage;

const NUM_BINS: usize = 256;

/// Tuning parameters for adaptive equalization.
#[derive(Debug, Clone, Copy)]
pub struct ClaheParams {
    /// Per-bin clip limit, normalized against a uniform histogram:
    /// a bin may hold at most `clip_limit * tile_pixels / 256` counts.
    pub clip_limit: f32,

    /// Number of tiles along each image dimension.
    pub tile_grid: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

impl ClaheParams {
    /// Parameters from the loaded pipeline configuration.
    pub fn from_config() -> Self {
        let defaults = &crate::config::pipeline_config_handle().config.defaults;
        Self {
            clip_limit: defaults.clahe_clip_limit,
            tile_grid: defaults.clahe_tile_grid,
        }
    }
}

/// Equalize a single-channel image tile-locally with a clip limit.
///
/// Output dimensions equal input dimensions. Degenerate inputs (empty
/// image) are returned unchanged.
pub fn equalize_adaptive(channel: &GrayImage, params: &ClaheParams) -> GrayImage {
    let (width, height) = channel.dimensions();
    if width == 0 || height == 0 {
        return channel.clone();
    }

    let grid = params.tile_grid.max(1);
    // On tiny images fall back to fewer tiles so none are empty
    let tiles_x = grid.min(width) as usize;
    let tiles_y = grid.min(height) as usize;

    // Partition each axis evenly; tile sizes differ by at most one
    // pixel and every tile stays inside the image
    let mut luts = vec![[0u8; NUM_BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        let y0 = ty * height as usize / tiles_y;
        let y1 = (ty + 1) * height as usize / tiles_y;
        for tx in 0..tiles_x {
            let x0 = tx * width as usize / tiles_x;
            let x1 = (tx + 1) * width as usize / tiles_x;
            luts[ty * tiles_x + tx] = tile_lut(channel, x0, y0, x1, y1, params.clip_limit);
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        // Position in tile-center coordinates
        let gx = ((x as f32 + 0.5) / tile_w - 0.5).clamp(0.0, (tiles_x - 1) as f32);
        let gy = ((y as f32 + 0.5) / tile_h - 0.5).clamp(0.0, (tiles_y - 1) as f32);

        let tx0 = gx.floor() as usize;
        let ty0 = gy.floor() as usize;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fx = gx - tx0 as f32;
        let fy = gy - ty0 as f32;

        let v = channel.get_pixel(x, y)[0] as usize;
        let v00 = luts[ty0 * tiles_x + tx0][v] as f32;
        let v01 = luts[ty0 * tiles_x + tx1][v] as f32;
        let v10 = luts[ty1 * tiles_x + tx0][v] as f32;
        let v11 = luts[ty1 * tiles_x + tx1][v] as f32;

        let top = v00 * (1.0 - fx) + v01 * fx;
        let bottom = v10 * (1.0 - fx) + v11 * fx;
        let value = top * (1.0 - fy) + bottom * fy;

        pixel[0] = value.round().clamp(0.0, 255.0) as u8;
    }

    out
}

/// Build the clipped equalization lookup table of one tile.
fn tile_lut(
    channel: &GrayImage,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    clip_limit: f32,
) -> [u8; NUM_BINS] {
    let mut identity = [0u8; NUM_BINS];
    for (v, entry) in identity.iter_mut().enumerate() {
        *entry = v as u8;
    }

    let pixel_count = ((x1 - x0) * (y1 - y0)) as u32;
    if pixel_count == 0 {
        return identity;
    }

    let mut hist = [0u32; NUM_BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[channel.get_pixel(x as u32, y as u32)[0] as usize] += 1;
        }
    }

    // Clip each bin, collecting the excess
    let clip_threshold = ((clip_limit * pixel_count as f32 / NUM_BINS as f32) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip_threshold {
            excess += *bin - clip_threshold;
            *bin = clip_threshold;
        }
    }

    // Redistribute the excess uniformly so the CDF still sums to the
    // tile's pixel count
    let increment = excess / NUM_BINS as u32;
    let remainder = (excess % NUM_BINS as u32) as usize;
    for (bin_index, bin) in hist.iter_mut().enumerate() {
        *bin += increment;
        if bin_index < remainder {
            *bin += 1;
        }
    }

    let mut lut = [0u8; NUM_BINS];
    let mut running = 0u32;
    for (v, entry) in lut.iter_mut().enumerate() {
        running += hist[v];
        *entry = ((running as f32 / pixel_count as f32) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8;
    }

    lut
}
