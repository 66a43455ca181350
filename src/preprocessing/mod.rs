//! Image preprocessing module for OCR enhancement
//!
//! Normalizes decoded documents before they reach the engines. Every step
//! is best-effort: a failing step is skipped and the pipeline continues with
//! the last image it produced.

pub mod pipeline;
#[cfg(feature = "preprocessing")]
pub mod steps;

pub use pipeline::{
    PreprocessedImage, PreprocessingReport, Preprocessor, Step, StepOutcome, StepTiming,
};
