use clap::{Parser, Subcommand};
use fundusprep_cli::{mask_output_path, run_batch};
use fundusprep_core::models::{BatchOptions, MaskReport};
use fundusprep_core::{clahe, color, config, decoders, exporters, mask, pipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fundusprep")]
#[command(version, about = "Fundus photograph batch preprocessor", long_about = None)]
struct Cli {
    /// Enable verbose stage-by-stage output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess a directory of photographs against a reference
    Process {
        /// Reference image whose color distribution anchors the batch
        #[arg(short, long, value_name = "FILE")]
        reference: PathBuf,

        /// Directory of input photographs
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        /// Output directory (wiped and recreated)
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,

        /// Square output size in pixels (0 = keep input dimensions)
        #[arg(long, value_name = "N", default_value = "0")]
        size: u32,

        /// Initial edge-detection threshold for mask extraction
        /// (default from pipeline.yml, or 12)
        #[arg(short = 't', long, value_name = "N")]
        threshold: Option<u8>,

        /// Downscale divisor (2.0 halves each dimension); ignored when --size is set
        #[arg(long, value_name = "FLOAT", default_value = "1.0")]
        scale: f32,

        /// Skip eye-region masking and process full frames
        #[arg(long)]
        no_mask: bool,

        /// Number of parallel threads
        #[arg(short = 'j', long, value_name = "N")]
        threads: Option<usize>,

        /// Print intermediate statistics for every image
        #[arg(long)]
        debug: bool,
    },

    /// Extract the eye-region mask of a single image
    Mask {
        /// Input image
        input: PathBuf,

        /// Initial edge-detection threshold
        #[arg(short = 't', long, value_name = "N")]
        threshold: Option<u8>,

        /// Save the mask as a PNG
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Save a JSON report (coverage, attempts, convergence)
        #[arg(short, long, value_name = "FILE")]
        save: Option<PathBuf>,
    },

    /// Process one image and dump every intermediate stage
    Debug {
        /// Reference image
        #[arg(short, long, value_name = "FILE")]
        reference: PathBuf,

        /// Target image to trace through the pipeline
        target: PathBuf,

        /// Output directory for stage dumps
        #[arg(short, long, value_name = "DIR", default_value = "debug-out")]
        out: PathBuf,

        /// Initial edge-detection threshold
        #[arg(short = 't', long, value_name = "N")]
        threshold: Option<u8>,
    },
}

/// CLI value if given, otherwise the configured default.
fn resolve_threshold(cli_value: Option<u8>) -> u8 {
    cli_value.unwrap_or_else(|| {
        config::pipeline_config_handle()
            .config
            .defaults
            .edge_threshold
    })
}

fn main() {
    let cli = Cli::parse();
    config::set_verbose(cli.verbose);

    let result = match cli.command {
        Commands::Process {
            reference,
            input,
            out,
            size,
            threshold,
            scale,
            no_mask,
            threads,
            debug,
        } => cmd_process(
            reference, input, out, size, threshold, scale, no_mask, threads, debug,
        ),

        Commands::Mask {
            input,
            threshold,
            out,
            save,
        } => cmd_mask(input, threshold, out, save),

        Commands::Debug {
            reference,
            target,
            out,
            threshold,
        } => cmd_debug(reference, target, out, threshold),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_process(
    reference: PathBuf,
    input: PathBuf,
    out: PathBuf,
    size: u32,
    threshold: Option<u8>,
    scale: f32,
    no_mask: bool,
    threads: Option<usize>,
    debug: bool,
) -> Result<(), String> {
    if scale <= 0.0 {
        return Err(format!("Scale divisor must be positive, got {}", scale));
    }

    // Debug statistics ride on the verbose channel
    if debug {
        config::set_verbose(true);
    }

    let options = BatchOptions {
        reference,
        input_dir: input,
        output_dir: out,
        output_size: size,
        edge_threshold: resolve_threshold(threshold),
        scale,
        mask_enabled: !no_mask,
        debug,
        threads,
    };

    let summary = run_batch(&options)?;
    fundusprep_cli::print_summary(&summary, &options);

    if summary.failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} files failed to process", summary.failed.len()))
    }
}

fn cmd_mask(
    input: PathBuf,
    threshold: Option<u8>,
    out: Option<PathBuf>,
    save: Option<PathBuf>,
) -> Result<(), String> {
    config::log_config_usage();
    let threshold = resolve_threshold(threshold);

    println!("Decoding {}...", input.display());
    let decoded = decoders::decode_image(&input)?;
    println!("  Image: {}x{}", decoded.width, decoded.height);

    let outcome = mask::extract_mask(&decoded.pixels, threshold);
    println!("  Coverage: {:.4}", outcome.coverage);
    println!("  Attempts: {}", outcome.attempts);
    println!("  Converged: {}", outcome.converged());

    if let Some(out_path) = out {
        exporters::save_mask(&outcome.mask, &out_path)?;
        println!("Mask saved to {}", out_path.display());
    }

    if let Some(save_path) = save {
        let report = MaskReport {
            path: Some(input.clone()),
            width: decoded.width,
            height: decoded.height,
            coverage: outcome.coverage,
            attempts: outcome.attempts,
            converged: outcome.converged(),
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize mask report: {}", e))?;
        std::fs::write(&save_path, json)
            .map_err(|e| format!("Failed to write {}: {}", save_path.display(), e))?;
        println!("Report saved to {}", save_path.display());
    }

    Ok(())
}

/// Trace one target through the pipeline, writing each stage to disk.
fn cmd_debug(
    reference: PathBuf,
    target: PathBuf,
    out: PathBuf,
    threshold: Option<u8>,
) -> Result<(), String> {
    config::set_verbose(true);
    config::log_config_usage();
    let threshold = resolve_threshold(threshold);

    let options = BatchOptions {
        reference: reference.clone(),
        input_dir: PathBuf::new(),
        output_dir: out.clone(),
        output_size: 0,
        edge_threshold: threshold,
        scale: 1.0,
        mask_enabled: true,
        debug: true,
        threads: None,
    };

    fundusprep_cli::recreate_dir(&out)?;

    println!("Decoding reference {}...", reference.display());
    let reference_decoded = decoders::decode_image(&reference)?;
    let reference_data = pipeline::prepare_reference(&reference_decoded, &options)?;
    println!("  Reference mask coverage: {:.4}", reference_data.coverage);
    exporters::save_mask(&reference_data.mask, out.join("reference_mask.png"))?;

    println!("Decoding target {}...", target.display());
    let decoded = decoders::decode_image(&target)?;

    // Re-run the stages individually so every intermediate lands on disk
    let outcome = mask::extract_mask(&decoded.pixels, threshold);
    println!(
        "  Target mask coverage: {:.4} ({} attempt(s), converged: {})",
        outcome.coverage,
        outcome.attempts,
        outcome.converged()
    );
    exporters::save_mask(&outcome.mask, out.join("target_mask.png"))?;

    let specified = reference_data.model.apply(&decoded.pixels, &outcome.mask)?;
    exporters::save_image(&specified, out.join("specified.png"))?;

    let value = color::value_plane(&specified);
    let enhanced_value = clahe::equalize_adaptive(&value, &clahe::ClaheParams::from_config());
    exporters::save_mask(&enhanced_value, out.join("enhanced_value.png"))?;

    let enhanced = color::replace_value_plane(&specified, &enhanced_value)?;
    exporters::save_image(&enhanced, out.join("enhanced.png"))?;

    let item = pipeline::process_image(decoded, &reference_data, &options)?;
    exporters::save_image(&item.image, out.join("final.png"))?;
    exporters::save_mask(&item.mask, mask_output_path(&target, &out)?)?;

    println!("Stage dumps written to {}", out.display());
    Ok(())
}
