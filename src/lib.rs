//! Document text extraction with engine fallback
//!
//! Decodes an image or scanned PDF, optionally cleans it up, and runs it
//! through up to two OCR engines, keeping whichever output is most
//! trustworthy. See [`Extractor`] for the entry point.

pub mod capability;
pub mod config;
pub mod document;
pub mod engine;
pub mod engines;
pub mod error;
pub mod orchestrator;
pub mod preprocessing;
pub mod quality;
pub mod result;

pub use capability::CapabilitySet;
pub use config::{Config, FallbackStrategy};
pub use document::RawDocument;
pub use engine::{BoundingBox, EngineOutput, Region, TextEngine};
pub use engines::{EngineInfo, EngineRole, EngineSet};
pub use error::{EngineError, OcrError, PreprocessError, NO_ENGINE_AVAILABLE};
pub use orchestrator::Extractor;
pub use quality::QualityTier;
pub use result::{EngineAttempt, EngineUsed, ExtractionResult};
