//! Color management and transformations
//!
//! RGB <-> HSV conversions used by the luminance enhancement stage,
//! which equalizes the value channel only and leaves hue and
//! saturation untouched.

use image::{GrayImage, RgbImage};

/// HSV color representation
/// - H (hue): 0.0-360.0 degrees
/// - S (saturation): 0.0-1.0
/// - V (value): 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

/// Convert 8-bit RGB to HSV
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;

    // Achromatic case
    if delta < 1e-6 {
        return Hsv { h: 0.0, s: 0.0, v };
    }

    let s = delta / max;

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / delta;
        if g < b {
            h += 6.0;
        }
        h * 60.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / delta + 2.0) * 60.0
    } else {
        ((r - g) / delta + 4.0) * 60.0
    };

    Hsv { h: h % 360.0, s, v }
}

/// Convert HSV back to 8-bit RGB
///
/// Value-preserving up to rounding: the returned pixel's maximum
/// channel equals `round(v * 255)`.
#[inline]
pub fn hsv_to_rgb(hsv: Hsv) -> (u8, u8, u8) {
    let Hsv { h, s, v } = hsv;
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);

    // Achromatic case
    if s < 1e-6 {
        let gray = (v * 255.0).round() as u8;
        return (gray, gray, gray);
    }

    let h = ((h % 360.0) + 360.0) % 360.0;
    let sector = h / 60.0;

    let c = v * s;
    let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r1 + m) * 255.0).round() as u8,
        ((g1 + m) * 255.0).round() as u8,
        ((b1 + m) * 255.0).round() as u8,
    )
}

/// Extract the value (brightness) plane of an RGB image.
///
/// The value channel of a pixel is exactly its maximum RGB channel, so
/// no rounding occurs in this direction.
pub fn value_plane(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut plane = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let v = pixel[0].max(pixel[1]).max(pixel[2]);
        plane.put_pixel(x, y, image::Luma([v]));
    }

    plane
}

/// Rebuild an RGB image with its value plane replaced.
///
/// Hue and saturation are carried over from the source pixel; only
/// brightness changes. Pixels whose value is unchanged are copied
/// through untouched to avoid needless rounding drift.
pub fn replace_value_plane(image: &RgbImage, value: &GrayImage) -> Result<RgbImage, String> {
    if image.dimensions() != value.dimensions() {
        return Err(format!(
            "Value plane dimensions {:?} do not match image dimensions {:?}",
            value.dimensions(),
            image.dimensions()
        ));
    }

    let mut out = image.clone();

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let old_v = pixel[0].max(pixel[1]).max(pixel[2]);
        let new_v = value.get_pixel(x, y)[0];
        if new_v == old_v {
            continue;
        }

        let mut hsv = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        hsv.v = new_v as f32 / 255.0;
        let (r, g, b) = hsv_to_rgb(hsv);
        *pixel = image::Rgb([r, g, b]);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_rgb_hsv_roundtrip() {
        let test_cases = [
            (255u8, 0u8, 0u8), // Red
            (0, 255, 0),       // Green
            (0, 0, 255),       // Blue
            (255, 255, 255),   // White
            (0, 0, 0),         // Black
            (128, 128, 128),   // Gray
            (255, 128, 0),     // Orange
            (128, 0, 128),     // Purple
            (180, 90, 45),     // Fundus-ish brown
        ];

        for (r, g, b) in test_cases {
            let hsv = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(hsv);

            assert!(
                (r as i32 - r2 as i32).abs() <= 1,
                "R mismatch for ({}, {}, {}): {} vs {}",
                r,
                g,
                b,
                r,
                r2
            );
            assert!(
                (g as i32 - g2 as i32).abs() <= 1,
                "G mismatch for ({}, {}, {}): {} vs {}",
                r,
                g,
                b,
                g,
                g2
            );
            assert!(
                (b as i32 - b2 as i32).abs() <= 1,
                "B mismatch for ({}, {}, {}): {} vs {}",
                r,
                g,
                b,
                b,
                b2
            );
        }
    }

    #[test]
    fn test_hsv_values() {
        // Red should be H=0, S=1, V=1
        let hsv = rgb_to_hsv(255, 0, 0);
        assert!(hsv.h.abs() < 1e-4);
        assert!((hsv.s - 1.0).abs() < 1e-4);
        assert!((hsv.v - 1.0).abs() < 1e-4);

        // Green should be H=120
        let hsv = rgb_to_hsv(0, 255, 0);
        assert!((hsv.h - 120.0).abs() < 1e-4);

        // Blue should be H=240
        let hsv = rgb_to_hsv(0, 0, 255);
        assert!((hsv.h - 240.0).abs() < 1e-4);

        // Mid gray: V = 0.5-ish, S = 0
        let hsv = rgb_to_hsv(128, 128, 128);
        assert!(hsv.s.abs() < 1e-4);
        assert!((hsv.v - 128.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn test_value_plane_is_max_channel() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 200, 30]));
        img.put_pixel(1, 0, Rgb([90, 40, 70]));

        let plane = value_plane(&img);
        assert_eq!(plane.get_pixel(0, 0)[0], 200);
        assert_eq!(plane.get_pixel(1, 0)[0], 90);
    }

    #[test]
    fn test_replace_value_plane_changes_brightness_only() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([200, 100, 50]));

        let mut plane = value_plane(&img);
        plane.put_pixel(0, 0, Luma([100]));

        let out = replace_value_plane(&img, &plane).unwrap();
        let pixel = out.get_pixel(0, 0);

        // New max channel equals the requested value
        assert_eq!(pixel[0].max(pixel[1]).max(pixel[2]), 100);

        // Hue preserved up to rounding
        let before = rgb_to_hsv(200, 100, 50);
        let after = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        assert!((before.h - after.h).abs() < 2.0);
        assert!((before.s - after.s).abs() < 0.02);
    }

    #[test]
    fn test_replace_value_plane_identity() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([12, 34, 56]));
        img.put_pixel(1, 1, Rgb([255, 0, 128]));

        let plane = value_plane(&img);
        let out = replace_value_plane(&img, &plane).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_replace_value_plane_dimension_mismatch() {
        let img = RgbImage::new(4, 4);
        let plane = GrayImage::new(2, 2);
        assert!(replace_value_plane(&img, &plane).is_err());
    }
}
