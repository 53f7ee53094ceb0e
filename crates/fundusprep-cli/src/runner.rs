//! Batch orchestration
//!
//! Drives a whole preprocessing run: set up the thread pool and output
//! directories, build the shared reference state, then process every
//! input in parallel. Per-item failures are collected rather than
//! aborting the batch; only reference-side failures are fatal.

use crate::input;
use fundusprep_core::models::BatchOptions;
use fundusprep_core::{decoders, exporters, pipeline};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Outcome of a batch run
#[derive(Debug)]
pub struct BatchSummary {
    /// Number of images processed and written successfully
    pub succeeded: usize,

    /// Inputs that failed, with the reason
    pub failed: Vec<(PathBuf, String)>,

    /// Wall-clock duration of the run
    pub elapsed: std::time::Duration,
}

/// Run a full batch per the given options.
///
/// Returns Err for fatal conditions (unreadable reference, unreadable
/// input directory, unwritable output directories). Per-item decode or
/// processing failures land in the summary instead.
pub fn run_batch(options: &BatchOptions) -> Result<BatchSummary, String> {
    fundusprep_core::config::log_config_usage();
    let start = Instant::now();

    if let Some(num_threads) = options.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        println!("Using {} threads for parallel processing", num_threads);
    }

    let inputs = input::list_input_files(&options.input_dir)?;
    if inputs.is_empty() {
        return Err(format!(
            "No supported image files found in {}",
            options.input_dir.display()
        ));
    }

    let masks_dir = options.masks_dir();
    input::recreate_dir(&options.output_dir)?;
    input::recreate_dir(&masks_dir)?;

    println!("Decoding reference {}...", options.reference.display());
    let reference_decoded = decoders::decode_image(&options.reference)?;
    let reference = pipeline::prepare_reference(&reference_decoded, options)?;
    println!(
        "  Reference: {}x{}, mask coverage {:.4}",
        reference_decoded.width, reference_decoded.height, reference.coverage
    );

    println!("\nProcessing {} files in parallel...\n", inputs.len());

    let processed_count = AtomicUsize::new(0);
    let total_files = inputs.len();

    let results: Vec<Result<PathBuf, String>> = inputs
        .par_iter()
        .map(|input_path| {
            let decoded = decoders::decode_image(input_path)?;
            let item = pipeline::process_image(decoded, &reference, options)?;

            let image_path = input::image_output_path(input_path, &options.output_dir)?;
            let mask_path = input::mask_output_path(input_path, &masks_dir)?;

            exporters::save_image(&item.image, &image_path)?;
            exporters::save_mask(&item.mask, &mask_path)?;

            let count = processed_count.fetch_add(1, Ordering::SeqCst) + 1;
            println!(
                "[{}/{}] Processed: {} -> {}",
                count,
                total_files,
                input_path.display(),
                image_path.display()
            );

            Ok(image_path)
        })
        .collect();

    let mut succeeded = 0;
    let mut failed: Vec<(PathBuf, String)> = Vec::new();
    for (input_path, result) in inputs.iter().zip(results.iter()) {
        match result {
            Ok(_) => succeeded += 1,
            Err(e) => failed.push((input_path.clone(), e.clone())),
        }
    }

    Ok(BatchSummary {
        succeeded,
        failed,
        elapsed: start.elapsed(),
    })
}

/// Print the end-of-run summary block.
pub fn print_summary(summary: &BatchSummary, options: &BatchOptions) {
    println!("\n========================================");
    println!("BATCH PREPROCESSING COMPLETE");
    println!("========================================");
    println!("  Successful: {}", summary.succeeded);
    println!("  Failed:     {}", summary.failed.len());
    println!("  Output dir: {}", options.output_dir.display());
    println!("  Elapsed:    {:.2}s", summary.elapsed.as_secs_f64());

    if !summary.failed.is_empty() {
        println!("\nErrors:");
        for (path, error) in &summary.failed {
            println!("  {}: {}", path.display(), error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_ellipse_mut;
    use std::path::Path;

    fn write_eye_image(path: &Path, width: u32, height: u32) {
        let mut img = RgbImage::new(width, height);
        let cx = width as i32 / 2;
        let cy = height as i32 / 2;
        let rx = (width as f32 * 0.43) as i32;
        let ry = (height as f32 * 0.43) as i32;
        draw_filled_ellipse_mut(&mut img, (cx, cy), rx, ry, Rgb([190, 90, 40]));
        img.save(path).unwrap();
    }

    fn batch_options(root: &Path, output_size: u32) -> BatchOptions {
        BatchOptions {
            reference: root.join("reference.png"),
            input_dir: root.join("in"),
            output_dir: root.join("out"),
            output_size,
            edge_threshold: 12,
            scale: 1.0,
            mask_enabled: true,
            debug: false,
            threads: None,
        }
    }

    #[test]
    fn test_run_batch_writes_images_and_masks() {
        let dir = tempfile::tempdir().unwrap();
        let options = batch_options(dir.path(), 0);

        std::fs::create_dir(&options.input_dir).unwrap();
        write_eye_image(&options.reference, 256, 256);
        write_eye_image(&options.input_dir.join("one.png"), 256, 256);
        write_eye_image(&options.input_dir.join("two.png"), 200, 180);

        let summary = run_batch(&options).unwrap();

        assert_eq!(summary.succeeded, 2);
        assert!(summary.failed.is_empty());
        assert!(options.output_dir.join("one.png").is_file());
        assert!(options.output_dir.join("two.png").is_file());
        assert!(options.masks_dir().join("one.png").is_file());
        assert!(options.masks_dir().join("two.png").is_file());
    }

    #[test]
    fn test_run_batch_accounts_for_corrupt_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let options = batch_options(dir.path(), 0);

        std::fs::create_dir(&options.input_dir).unwrap();
        write_eye_image(&options.reference, 256, 256);
        write_eye_image(&options.input_dir.join("good.png"), 256, 256);
        std::fs::write(options.input_dir.join("bad.jpg"), b"not an image").unwrap();

        let summary = run_batch(&options).unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].0.ends_with("bad.jpg"));
        assert!(options.output_dir.join("good.png").is_file());
        assert!(!options.output_dir.join("bad.jpg").exists());
    }

    #[test]
    fn test_run_batch_resizes_to_fixed_output() {
        let dir = tempfile::tempdir().unwrap();
        let options = batch_options(dir.path(), 128);

        std::fs::create_dir(&options.input_dir).unwrap();
        write_eye_image(&options.reference, 256, 256);
        write_eye_image(&options.input_dir.join("one.png"), 300, 240);
        write_eye_image(&options.input_dir.join("two.png"), 256, 256);

        let summary = run_batch(&options).unwrap();
        assert_eq!(summary.succeeded, 2);

        for name in ["one.png", "two.png"] {
            let out = image::open(options.output_dir.join(name)).unwrap();
            assert_eq!((out.width(), out.height()), (128, 128));
            let mask = image::open(options.masks_dir().join(name)).unwrap();
            assert_eq!((mask.width(), mask.height()), (128, 128));
        }
    }

    #[test]
    fn test_run_batch_empty_input_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let options = batch_options(dir.path(), 0);

        std::fs::create_dir(&options.input_dir).unwrap();
        write_eye_image(&options.reference, 256, 256);

        let result = run_batch(&options);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("No supported image files"));
    }

    #[test]
    fn test_run_batch_wipes_stale_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let options = batch_options(dir.path(), 0);

        std::fs::create_dir(&options.input_dir).unwrap();
        std::fs::create_dir(&options.output_dir).unwrap();
        std::fs::write(options.output_dir.join("stale.png"), b"old").unwrap();
        write_eye_image(&options.reference, 256, 256);
        write_eye_image(&options.input_dir.join("one.png"), 256, 256);

        run_batch(&options).unwrap();

        assert!(!options.output_dir.join("stale.png").exists());
        assert!(options.output_dir.join("one.png").is_file());
    }
}
