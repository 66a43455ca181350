//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use. Fills the
//! primary role: fast and available everywhere the crate builds.

use super::download;
use super::heuristics::text_confidence;
use crate::config::Config;
use crate::engine::{BoundingBox, EngineOutput, Region, TextEngine};
use crate::error::{EngineError, OcrError};
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::sync::Arc;

const ENGINE_NAME: &str = "ocrs";

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

const DETECTION_MODEL_FILE: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILE: &str = "text-recognition.rten";

/// Cheap runtime check: models are cached, or the cache is writable so they
/// can be fetched on initialization.
pub fn runtime_check() -> bool {
    match download::cache_dir(None) {
        Ok(dir) => {
            let cached = dir.join(DETECTION_MODEL_FILE).exists()
                && dir.join(RECOGNITION_MODEL_FILE).exists();
            if !cached {
                tracing::debug!("ocrs models not cached yet, will download on initialization");
            }
            true
        }
        Err(e) => {
            tracing::debug!("ocrs unavailable: {}", e);
            false
        }
    }
}

/// Primary engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: Arc<OcrsOcrEngine>,
}

impl OcrsEngine {
    /// Create a new engine, downloading models if needed
    pub fn new(_config: &Config) -> Result<Self, OcrError> {
        let cache = download::cache_dir(None)?;
        let detection_model_path =
            download::ensure_downloaded(DETECTION_MODEL_URL, &cache, DETECTION_MODEL_FILE)?;
        let recognition_model_path =
            download::ensure_downloaded(RECOGNITION_MODEL_URL, &cache, RECOGNITION_MODEL_FILE)?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

impl TextEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn extract(&self, image: &DynamicImage) -> Result<EngineOutput, EngineError> {
        // ImageSource::from_bytes expects RGB8 in HWC layout
        let rgb_img = image.to_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            EngineError::failure(ENGINE_NAME, format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self.engine.prepare_input(img_source).map_err(|e| {
            EngineError::failure(ENGINE_NAME, format!("Failed to prepare input: {}", e))
        })?;

        let word_rects = self.engine.detect_words(&ocr_input).map_err(|e| {
            EngineError::failure(ENGINE_NAME, format!("Failed to detect words: {}", e))
        })?;

        // Lines come back in reading order
        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| {
                EngineError::failure(ENGINE_NAME, format!("Failed to recognize text: {}", e))
            })?;

        let regions: Vec<Region> = line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .filter_map(|line| {
                let text = line
                    .words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.trim().is_empty() {
                    return None;
                }
                let rect = line.bounding_rect();
                Some(Region {
                    bounding_box: BoundingBox::new(
                        rect.left().max(0) as u32,
                        rect.top().max(0) as u32,
                        rect.width().max(0) as u32,
                        rect.height().max(0) as u32,
                    ),
                    confidence: text_confidence(&text),
                    text,
                })
            })
            .collect();

        let text = regions
            .iter()
            .map(|region| region.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        // ocrs has no per-character confidence, so score the whole page text
        let mean_confidence = text_confidence(&text);

        tracing::debug!(
            "ocrs recognized {} lines ({} chars), confidence {:.2}",
            regions.len(),
            text.len(),
            mean_confidence
        );

        Ok(EngineOutput {
            text,
            regions,
            mean_confidence,
            reading_order: true,
        })
    }
}
