//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine. Better for noisy/messy images like phone photos,
//! so it fills the secondary role. Uses tesseract-static crate for static
//! linking (no system dependencies). Downloads tessdata (training data)
//! automatically on first use.
//!
//! Shares nothing with the primary engine: it re-encodes the image itself and
//! runs its own native instance per call.

use super::download;
use crate::config::Config;
use crate::engine::{BoundingBox, EngineOutput, Region, TextEngine};
use crate::error::{EngineError, OcrError};
use image::DynamicImage;
use std::path::Path;
use tesseract_static::tesseract::Tesseract;

const ENGINE_NAME: &str = "leptess";

/// TSV row level for a single word
const TSV_WORD_LEVEL: u32 = 5;

/// Cheap runtime check: an explicit tessdata directory exists, or the cache
/// is writable so tessdata can be fetched on initialization.
pub fn runtime_check() -> bool {
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        if Path::new(&prefix).is_dir() {
            return true;
        }
    }
    download::cache_dir(Some("tessdata")).is_ok()
}

/// Secondary engine backed by Tesseract
pub struct LeptessEngine {
    /// Path to tessdata directory
    tessdata_path: String,
    /// Language for OCR
    language: String,
}

impl LeptessEngine {
    /// Create a new Tesseract-based engine
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let language = config.default_language.clone();
        let tessdata_path = resolve_tessdata(config.tessdata_path.as_deref(), &language)?;

        // Validate that tessdata is accessible by doing a test initialization
        let probe = Tesseract::new(Some(&tessdata_path), Some(&language)).map_err(|e| {
            OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;
        drop(probe);

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            language
        );

        Ok(Self {
            tessdata_path,
            language,
        })
    }
}

impl TextEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - better for noisy/messy images like phone photos"
    }

    fn extract(&self, image: &DynamicImage) -> Result<EngineOutput, EngineError> {
        let rgb_img = image.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // BMP is always supported by leptonica
        let mut bmp_data = Vec::new();
        rgb_img
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| {
                EngineError::failure(ENGINE_NAME, format!("Failed to convert to BMP: {}", e))
            })?;

        tracing::debug!(
            "Processing image: {}x{}, BMP size: {} bytes",
            width,
            height,
            bmp_data.len()
        );

        let tess = Tesseract::new(Some(&self.tessdata_path), Some(&self.language)).map_err(
            |e| EngineError::failure(ENGINE_NAME, format!("Failed to create Tesseract: {}", e)),
        )?;

        let tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            EngineError::failure(
                ENGINE_NAME,
                format!("Failed to set image ({}x{}): {}", width, height, e),
            )
        })?;

        let mut tess = tess.recognize().map_err(|e| {
            EngineError::failure(ENGINE_NAME, format!("Failed to recognize text: {}", e))
        })?;

        let text = tess
            .get_text()
            .map_err(|e| EngineError::failure(ENGINE_NAME, format!("Failed to get text: {}", e)))?;

        // 0-100 scale
        let mean_confidence = tess.mean_text_conf() as f32 / 100.0;

        let regions = match tess.get_tsv_text(0) {
            Ok(tsv) => line_regions_from_tsv(&tsv),
            Err(e) => {
                tracing::debug!("Tesseract TSV layout unavailable: {}", e);
                Vec::new()
            }
        };

        Ok(EngineOutput {
            text: text.trim().to_string(),
            regions,
            mean_confidence,
            reading_order: true,
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        // Tesseract supports many languages - return common ones
        [
            "eng", "deu", "fra", "spa", "ita", "por", "nld", "jpn", "chi_sim", "chi_tra", "kor",
            "ara", "rus",
        ]
        .iter()
        .map(|lang| lang.to_string())
        .collect()
    }
}

/// One word row from Tesseract's TSV output
#[derive(Debug, PartialEq)]
struct TsvWord<'a> {
    line_key: (u32, u32, u32),
    bounding_box: BoundingBox,
    confidence: f32,
    text: &'a str,
}

fn parse_tsv_word(row: &str) -> Option<TsvWord<'_>> {
    let cols: Vec<&str> = row.splitn(12, '\t').collect();
    if cols.len() < 12 {
        return None;
    }
    let level: u32 = cols[0].parse().ok()?;
    if level != TSV_WORD_LEVEL {
        return None;
    }
    let text = cols[11].trim();
    let confidence: f32 = cols[10].trim().parse().ok()?;
    if text.is_empty() || confidence < 0.0 {
        return None;
    }

    let num = |i: usize| cols[i].trim().parse::<u32>().ok();
    Some(TsvWord {
        line_key: (num(2)?, num(3)?, num(4)?),
        bounding_box: BoundingBox::new(num(6)?, num(7)?, num(8)?, num(9)?),
        confidence: confidence / 100.0,
        text,
    })
}

/// Group TSV word rows into line regions, keeping Tesseract's reading order.
fn line_regions_from_tsv(tsv: &str) -> Vec<Region> {
    let mut regions: Vec<Region> = Vec::new();
    let mut current_key = None;
    let mut word_count = 0usize;

    for word in tsv.lines().filter_map(parse_tsv_word) {
        if current_key == Some(word.line_key) {
            if let Some(region) = regions.last_mut() {
                region.bounding_box = region.bounding_box.union(&word.bounding_box);
                region.text.push(' ');
                region.text.push_str(word.text);
                // Running mean over the words in this line
                word_count += 1;
                region.confidence += (word.confidence - region.confidence) / word_count as f32;
                continue;
            }
        }

        current_key = Some(word.line_key);
        word_count = 1;
        regions.push(Region {
            bounding_box: word.bounding_box,
            text: word.text.to_string(),
            confidence: word.confidence,
        });
    }

    regions
}

/// Pick the tessdata directory: an explicit path that already holds the
/// language file, otherwise the download cache.
fn resolve_tessdata(explicit: Option<&str>, language: &str) -> Result<String, OcrError> {
    let traineddata_file = format!("{}.traineddata", language);

    if let Some(path) = explicit {
        if Path::new(path).join(&traineddata_file).exists() {
            return Ok(path.to_string());
        }
        tracing::warn!(
            "{} not found in {}, falling back to the download cache",
            traineddata_file,
            path
        );
    }

    let cache_dir = download::cache_dir(Some("tessdata"))?;
    download::ensure_downloaded(&tessdata_url(language), &cache_dir, &traineddata_file)?;

    // Tesseract expects the directory, not the file
    cache_dir
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // Use tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
