//! Final extraction result and its assembly
//!
//! `ExtractionResult` is built only through the constructors here, which
//! enforce its invariants: a result with `engine_used == None` has empty
//! text, zero confidence, a `Failed` tier and an error message.

use crate::engine::{clamp_confidence, EngineOutput, Region};
use crate::engines::EngineRole;
use crate::preprocessing::PreprocessingReport;
use crate::quality::{self, QualityTier};
use serde::Serialize;
use std::time::Duration;

/// Which engine produced the selected output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineUsed {
    Primary,
    Secondary,
    /// Both engines ran and both crossed the confidence threshold
    Both,
    None,
}

impl EngineUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Both => "both",
            Self::None => "none",
        }
    }
}

/// How one engine invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    TimedOut,
    Failed,
}

/// One engine invocation made while producing a result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineAttempt {
    pub engine: &'static str,
    pub role: EngineRole,
    pub outcome: AttemptOutcome,
    pub confidence: Option<f32>,
    pub elapsed_seconds: f64,
    pub error: Option<String>,
}

/// Immutable outcome of one extraction call
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    original_text: String,
    regions: Vec<Region>,
    confidence_score: f32,
    processing_time_seconds: f64,
    quality_assessment: QualityTier,
    engine_used: EngineUsed,
    error_message: Option<String>,
    regions_in_reading_order: bool,
    warnings: Vec<String>,
    attempts: Vec<EngineAttempt>,
    preprocessing: Option<PreprocessingReport>,
}

impl ExtractionResult {
    /// Assemble a result from the selected engine output.
    ///
    /// `engine_used` must name the engine(s) the output came from; passing
    /// `EngineUsed::None` yields a failure result instead.
    pub fn from_output(
        engine_used: EngineUsed,
        output: EngineOutput,
        elapsed: Duration,
        context: ResultContext,
    ) -> Self {
        if engine_used == EngineUsed::None {
            return Self::failure("no engine output was selected", elapsed, context);
        }

        let confidence_score = clamp_confidence(output.mean_confidence);
        let quality_assessment = quality::assess(
            confidence_score,
            output.regions.len(),
            output.text.chars().count(),
        );

        Self {
            original_text: output.text,
            regions: output.regions,
            confidence_score,
            processing_time_seconds: elapsed.as_secs_f64(),
            quality_assessment,
            engine_used,
            error_message: None,
            regions_in_reading_order: output.reading_order,
            warnings: context.warnings,
            attempts: context.attempts,
            preprocessing: context.preprocessing,
        }
    }

    /// Assemble a terminal failure. Never carries text.
    pub fn failure(message: impl Into<String>, elapsed: Duration, context: ResultContext) -> Self {
        Self {
            original_text: String::new(),
            regions: Vec::new(),
            confidence_score: 0.0,
            processing_time_seconds: elapsed.as_secs_f64(),
            quality_assessment: QualityTier::Failed,
            engine_used: EngineUsed::None,
            error_message: Some(message.into()),
            regions_in_reading_order: false,
            warnings: context.warnings,
            attempts: context.attempts,
            preprocessing: context.preprocessing,
        }
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Confidence of the selected output, not an average over attempts
    pub fn confidence_score(&self) -> f32 {
        self.confidence_score
    }

    /// Wall-clock time of the whole call, including every engine attempt
    pub fn processing_time_seconds(&self) -> f64 {
        self.processing_time_seconds
    }

    pub fn quality_assessment(&self) -> QualityTier {
        self.quality_assessment
    }

    pub fn engine_used(&self) -> EngineUsed {
        self.engine_used
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn regions_in_reading_order(&self) -> bool {
        self.regions_in_reading_order
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn attempts(&self) -> &[EngineAttempt] {
        &self.attempts
    }

    pub fn preprocessing(&self) -> Option<&PreprocessingReport> {
        self.preprocessing.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.engine_used != EngineUsed::None
    }
}

/// Diagnostics gathered during a call and attached to its result
#[derive(Debug, Clone, Default)]
pub struct ResultContext {
    pub warnings: Vec<String>,
    pub attempts: Vec<EngineAttempt>,
    pub preprocessing: Option<PreprocessingReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BoundingBox;

    fn output(text: &str, confidence: f32, regions: usize) -> EngineOutput {
        EngineOutput {
            text: text.to_string(),
            regions: (0..regions)
                .map(|i| Region {
                    bounding_box: BoundingBox::new(0, i as u32 * 20, 100, 18),
                    text: text.to_string(),
                    confidence,
                })
                .collect(),
            mean_confidence: confidence,
            reading_order: true,
        }
    }

    #[test]
    fn test_failure_invariants() {
        let result =
            ExtractionResult::failure("boom", Duration::from_millis(5), ResultContext::default());
        assert_eq!(result.engine_used(), EngineUsed::None);
        assert!(result.original_text().is_empty());
        assert!(result.regions().is_empty());
        assert_eq!(result.confidence_score(), 0.0);
        assert_eq!(result.quality_assessment(), QualityTier::Failed);
        assert_eq!(result.error_message(), Some("boom"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_from_output_with_none_becomes_failure() {
        let result = ExtractionResult::from_output(
            EngineUsed::None,
            output("text", 0.9, 1),
            Duration::ZERO,
            ResultContext::default(),
        );
        assert!(result.original_text().is_empty());
        assert!(result.error_message().is_some());
    }

    #[test]
    fn test_from_output_assesses_quality() {
        let result = ExtractionResult::from_output(
            EngineUsed::Primary,
            output("Invoice number 42", 0.9, 2),
            Duration::from_millis(120),
            ResultContext::default(),
        );
        assert_eq!(result.engine_used(), EngineUsed::Primary);
        assert_eq!(result.quality_assessment(), QualityTier::Excellent);
        assert_eq!(result.confidence_score(), 0.9);
        assert!((result.processing_time_seconds() - 0.12).abs() < 1e-9);
        assert!(result.error_message().is_none());
    }

    #[test]
    fn test_serializes_lowercase_enums() {
        let result = ExtractionResult::from_output(
            EngineUsed::Secondary,
            output("hello world", 0.5, 1),
            Duration::ZERO,
            ResultContext::default(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["engine_used"], "secondary");
        assert_eq!(json["quality_assessment"], "fair");
        assert_eq!(json["error_message"], serde_json::Value::Null);
    }
}
