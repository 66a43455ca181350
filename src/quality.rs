//! Quality assessment
//!
//! Maps a selected result's confidence and structure onto an ordered tier.
//! Pure and deterministic: the same inputs always give the same tier, and a
//! strictly better input never gets a lower tier.

use serde::Serialize;
use std::fmt;

/// Lower bounds (inclusive) of each tier above `Poor`
const FAIR_MIN: f32 = 0.40;
const GOOD_MIN: f32 = 0.65;
const EXCELLENT_MIN: f32 = 0.85;

/// Ordered classification of an extraction's trustworthiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Failed,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }

    /// One tier lower, saturating at `Failed`
    pub fn demote(self) -> Self {
        match self {
            Self::Excellent => Self::Good,
            Self::Good => Self::Fair,
            Self::Fair => Self::Poor,
            Self::Poor | Self::Failed => Self::Failed,
        }
    }

    /// Tier implied by confidence alone
    fn from_confidence(confidence: f32) -> Self {
        if confidence.is_nan() || confidence <= 0.0 {
            Self::Failed
        } else if confidence < FAIR_MIN {
            Self::Poor
        } else if confidence < GOOD_MIN {
            Self::Fair
        } else if confidence < EXCELLENT_MIN {
            Self::Good
        } else {
            Self::Excellent
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a result.
///
/// No text or zero confidence is `Failed`. Text with no detected regions is
/// demoted one tier below what its confidence implies, but never below
/// `Poor`: `Failed` is reserved for results that carry no usable text.
pub fn assess(confidence_score: f32, region_count: usize, text_length: usize) -> QualityTier {
    if text_length == 0 {
        return QualityTier::Failed;
    }

    let tier = QualityTier::from_confidence(confidence_score);
    if region_count == 0 && tier > QualityTier::Poor {
        tier.demote()
    } else {
        tier
    }
}
