//! Fundusprep Core Library
//!
//! Core functionality for batch preprocessing of ocular fundus
//! photographs: eye-region segmentation, reference-driven histogram
//! specification and adaptive luminance enhancement.

pub mod clahe;
pub mod color;
pub mod config;
pub mod decoders;
pub mod exporters;
pub mod histspec;
pub mod mask;
pub mod models;
pub mod pipeline;

// Re-export commonly used types
pub use clahe::ClaheParams;
pub use color::Hsv;
pub use decoders::DecodedImage;
pub use histspec::HistogramModel;
pub use mask::MaskOutcome;
pub use models::{BatchOptions, MaskReport};
pub use pipeline::{ProcessedItem, ReferenceData};
