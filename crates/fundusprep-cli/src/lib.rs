//! Shared utilities for fundusprep-cli
//!
//! Input discovery, output path layout and the batch runner, kept in a
//! library crate so integration tests can drive full runs directly.

pub mod input;
pub mod runner;

// Re-export commonly used items at the crate root for convenience
pub use input::{image_output_path, list_input_files, mask_output_path, recreate_dir};
pub use runner::{print_summary, run_batch, BatchSummary};
