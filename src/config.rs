use crate::error::OcrError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Primary output at or above this confidence is accepted without a fallback run
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.75;
/// Hard bound on a single engine invocation
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(5);
/// Maximum document size in bytes (50MB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// How the orchestrator schedules the two engines when both are available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    /// Primary first; secondary only when the primary fails or falls below threshold
    #[default]
    Sequential,
    /// Both engines launched together; both outcomes are awaited
    Concurrent,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
        }
    }
}

impl FromStr for FallbackStrategy {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(OcrError::InvalidConfig(format!(
                "unknown fallback strategy '{}' (expected 'sequential' or 'concurrent')",
                other
            ))),
        }
    }
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub confidence_threshold: f32,
    pub engine_timeout: Duration,
    pub enable_preprocessing: bool,
    pub fallback_strategy: FallbackStrategy,
    pub enable_primary: bool,
    pub enable_secondary: bool,
    /// Tesseract language code (e.g. "eng", "deu")
    pub default_language: String,
    pub tessdata_path: Option<String>,
    pub max_file_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            enable_preprocessing: true,
            fallback_strategy: FallbackStrategy::default(),
            enable_primary: true,
            enable_secondary: true,
            default_language: "eng".to_string(),
            tessdata_path: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), OcrError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(OcrError::InvalidConfig(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.engine_timeout.is_zero() {
            return Err(OcrError::InvalidConfig(
                "engine_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(OcrError::InvalidConfig(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        if self.default_language.trim().is_empty() {
            return Err(OcrError::InvalidConfig(
                "default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
