use crate::document::{self, RawDocument};
use crate::error::PreprocessError;
use image::DynamicImage;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

#[cfg(feature = "preprocessing")]
use super::steps;

/// Signature shared by every preprocessing step
pub type StepFn = fn(&DynamicImage) -> Result<DynamicImage, PreprocessError>;

/// A named preprocessing step
#[derive(Clone, Copy)]
pub struct Step {
    pub name: &'static str,
    pub apply: StepFn,
}

/// Whether a step's output was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Applied,
    Failed,
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
    pub outcome: StepOutcome,
}

/// What preprocessing did to a document
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreprocessingReport {
    /// At least one step ran
    pub applied: bool,
    /// At least one step failed and its input was carried forward
    pub partial: bool,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
    pub failures: Vec<String>,
}

/// Image ready for the engines, owned by the current extraction call
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    pub image: DynamicImage,
    pub report: PreprocessingReport,
}

/// Preprocessing pipeline: format normalization, denoise, adaptive
/// binarization and deskew, in that order
#[derive(Clone)]
pub struct Preprocessor {
    steps: Vec<Step>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(default_steps())
    }
}

impl Preprocessor {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// A pipeline that passes images through unmodified
    pub fn passthrough() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Decode `raw` and run every step.
    ///
    /// Only decoding can fail: step failures are recorded in the report and
    /// the last good image is carried forward.
    pub fn preprocess(&self, raw: &RawDocument) -> Result<PreprocessedImage, PreprocessError> {
        let image = document::decode(raw)?;
        Ok(self.process_image(image))
    }

    /// Run every step on an already decoded image
    pub fn process_image(&self, image: DynamicImage) -> PreprocessedImage {
        let start = Instant::now();
        let mut report = PreprocessingReport::default();
        let mut img = image;

        for step in &self.steps {
            img = run_step(*step, img, &mut report);
        }

        report.applied = report
            .steps
            .iter()
            .any(|s| s.outcome == StepOutcome::Applied);
        report.total_time_ms = start.elapsed().as_millis() as u64;

        if report.partial {
            tracing::warn!(
                "Preprocessing partially applied: {}",
                report.failures.join("; ")
            );
        }

        PreprocessedImage { image: img, report }
    }
}

fn run_step(step: Step, img: DynamicImage, report: &mut PreprocessingReport) -> DynamicImage {
    let step_start = Instant::now();

    // imageproc panics on some degenerate inputs; treat that as a step failure
    let result = catch_unwind(AssertUnwindSafe(|| (step.apply)(&img)))
        .unwrap_or_else(|_| Err(PreprocessError::step(step.name, "step panicked")));

    let time_ms = step_start.elapsed().as_millis() as u64;

    match result {
        Ok(next) => {
            tracing::debug!("Preprocessing step '{}' took {}ms", step.name, time_ms);
            report.steps.push(StepTiming {
                name: step.name.to_string(),
                time_ms,
                outcome: StepOutcome::Applied,
            });
            next
        }
        Err(e) => {
            report.partial = true;
            report.failures.push(e.to_string());
            report.steps.push(StepTiming {
                name: step.name.to_string(),
                time_ms,
                outcome: StepOutcome::Failed,
            });
            img
        }
    }
}

#[cfg(feature = "preprocessing")]
fn default_steps() -> Vec<Step> {
    vec![
        Step {
            name: "grayscale",
            apply: steps::grayscale::apply,
        },
        Step {
            name: "normalize",
            apply: steps::normalize::apply,
        },
        Step {
            name: "denoise",
            apply: steps::denoise::apply,
        },
        Step {
            name: "threshold",
            apply: steps::threshold::apply,
        },
        Step {
            name: "deskew",
            apply: steps::deskew::apply,
        },
    ]
}

#[cfg(not(feature = "preprocessing"))]
fn default_steps() -> Vec<Step> {
    Vec::new()
}
