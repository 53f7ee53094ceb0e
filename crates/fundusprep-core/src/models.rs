//! Data models for Fundusprep
//!
//! Core data structures for batch job parameters and mask reports.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters for one batch preprocessing run.
///
/// Immutable for the duration of the run; every stage reads from this
/// struct rather than from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Reference photograph used to build the histogram model
    pub reference: PathBuf,

    /// Directory containing input photographs
    pub input_dir: PathBuf,

    /// Output directory root; a "masks" subdirectory is created inside it
    pub output_dir: PathBuf,

    /// Forced square output side length for image and mask; 0 disables
    #[serde(default)]
    pub output_size: u32,

    /// Initial edge sensitivity for contour discovery
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: u8,

    /// Uniform downscale divisor applied when `output_size` is not set
    /// (output dimensions = input dimensions / scale)
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Whether eye-region segmentation is applied; when false a
    /// full-coverage mask is used everywhere
    #[serde(default = "default_true")]
    pub mask_enabled: bool,

    /// Enable debug output showing intermediate statistics
    #[serde(default)]
    pub debug: bool,

    /// Number of parallel threads for batch processing
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_edge_threshold() -> u8 {
    12
}

fn default_scale() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl BatchOptions {
    /// Directory where per-item masks are written.
    pub fn masks_dir(&self) -> PathBuf {
        self.output_dir.join("masks")
    }
}

/// Serializable summary of one mask extraction, for inspection tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskReport {
    /// Source image path, if known
    pub path: Option<PathBuf>,

    /// Mask width in pixels
    pub width: u32,

    /// Mask height in pixels
    pub height: u32,

    /// Foreground pixel fraction of the mask (0.0-1.0)
    pub coverage: f64,

    /// Number of outer segmentation attempts performed (1-3); 0 means
    /// segmentation was skipped entirely
    pub attempts: u32,

    /// Whether the coverage convergence target was reached
    pub converged: bool,
}
