//! Fallback orchestrator
//!
//! Decides which engines to run for a document and which output to trust:
//!
//! 1. No engine available: `Failed` result, `engine_used = None`.
//! 2. One engine available: its output, or its error as the result message.
//! 3. Both available: the primary runs first and is accepted outright when
//!    its confidence reaches the threshold.
//! 4. Otherwise the secondary runs and wins only with strictly higher
//!    confidence (or when the primary failed). Both failing reports the
//!    secondary's error.
//!
//! Under `FallbackStrategy::Concurrent` both engines start together and the
//! same selection applies to the two outcomes; when both cross the threshold
//! the result is tagged `Both`.

use crate::capability::{self, CapabilitySet};
use crate::config::{Config, FallbackStrategy};
use crate::document::RawDocument;
use crate::engine::{EngineOutput, TimedEngine};
use crate::engines::{EngineInfo, EngineRole, EngineSet};
use crate::error::{EngineError, OcrError, NO_ENGINE_AVAILABLE};
use crate::preprocessing::Preprocessor;
use crate::result::{AttemptOutcome, EngineAttempt, EngineUsed, ExtractionResult, ResultContext};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

impl From<EngineRole> for EngineUsed {
    fn from(role: EngineRole) -> Self {
        match role {
            EngineRole::Primary => EngineUsed::Primary,
            EngineRole::Secondary => EngineUsed::Secondary,
        }
    }
}

/// Output chosen by the fallback policy
struct Selected {
    engine_used: EngineUsed,
    output: EngineOutput,
}

/// The document text-extraction pipeline
pub struct Extractor {
    config: Config,
    capabilities: CapabilitySet,
    primary: Option<TimedEngine>,
    secondary: Option<TimedEngine>,
    preprocessor: Preprocessor,
    engine_info: Vec<EngineInfo>,
}

impl Extractor {
    /// Probe the environment and initialize every usable engine
    pub fn from_config(config: Config) -> Result<Self, OcrError> {
        config.validate()?;
        let probed = capability::probe();
        let engines = EngineSet::initialize(&config, &probed);
        Ok(Self::with_engines(config, probed, engines))
    }

    /// Build from explicit engines. An engine is used only when the
    /// capability set, the configuration and the engine set all allow it.
    pub fn with_engines(config: Config, capabilities: CapabilitySet, engines: EngineSet) -> Self {
        let mut effective = capabilities.intersect(&engines.capabilities());
        effective.primary_available &= config.enable_primary;
        effective.secondary_available &= config.enable_secondary;

        let engines = EngineSet {
            primary: engines.primary.filter(|_| effective.primary_available),
            secondary: engines.secondary.filter(|_| effective.secondary_available),
        };
        let engine_info = engines.info();

        let preprocessor = if effective.preprocessing_available && config.enable_preprocessing {
            Preprocessor::default()
        } else {
            Preprocessor::passthrough()
        };

        let timeout = config.engine_timeout;
        Self {
            primary: engines.primary.map(|e| TimedEngine::new(e, timeout)),
            secondary: engines.secondary.map(|e| TimedEngine::new(e, timeout)),
            capabilities: effective,
            preprocessor,
            engine_info,
            config,
        }
    }

    /// Replace the preprocessing pipeline
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Capabilities this extractor actually uses
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine_info(&self) -> &[EngineInfo] {
        &self.engine_info
    }

    /// Extract text from a document. Always returns a result; failures are
    /// reported through `error_message` and a `Failed` tier.
    pub async fn run(&self, raw: &RawDocument) -> ExtractionResult {
        let start = Instant::now();
        let mut ctx = ResultContext::default();

        tracing::info!(
            filename = %raw.filename,
            content_type = %raw.declared_content_type,
            bytes = raw.bytes.len(),
            "Starting extraction"
        );

        if self.primary.is_none() && self.secondary.is_none() {
            return self.finish(ExtractionResult::failure(
                NO_ENGINE_AVAILABLE,
                start.elapsed(),
                ctx,
            ));
        }

        if raw.bytes.len() > self.config.max_file_size {
            let message = format!(
                "Document too large: {} bytes (max: {} bytes)",
                raw.bytes.len(),
                self.config.max_file_size
            );
            return self.finish(ExtractionResult::failure(message, start.elapsed(), ctx));
        }

        let prepared = match self.preprocessor.preprocess(raw) {
            Ok(prepared) => prepared,
            Err(e) => {
                return self.finish(ExtractionResult::failure(
                    e.to_string(),
                    start.elapsed(),
                    ctx,
                ))
            }
        };
        if prepared.report.partial {
            ctx.warnings.push(format!(
                "Preprocessing partially applied: {}",
                prepared.report.failures.join("; ")
            ));
        }
        if !self.preprocessor.step_names().is_empty() {
            ctx.preprocessing = Some(prepared.report);
        }
        let image = Arc::new(prepared.image);

        let selection = match (&self.primary, &self.secondary) {
            (Some(engine), None) => {
                self.single(engine, EngineRole::Primary, image, &mut ctx)
                    .await
            }
            (None, Some(engine)) => {
                self.single(engine, EngineRole::Secondary, image, &mut ctx)
                    .await
            }
            (Some(primary), Some(secondary)) => match self.config.fallback_strategy {
                FallbackStrategy::Sequential => {
                    self.sequential(primary, secondary, image, &mut ctx).await
                }
                FallbackStrategy::Concurrent => {
                    self.concurrent(primary, secondary, image, &mut ctx).await
                }
            },
            (None, None) => Err(EngineError::CapabilityUnavailable { engine: "any" }),
        };

        let result = match selection {
            Ok(selected) => ExtractionResult::from_output(
                selected.engine_used,
                selected.output,
                start.elapsed(),
                ctx,
            ),
            Err(e) => ExtractionResult::failure(e.to_string(), start.elapsed(), ctx),
        };

        self.finish(result)
    }

    /// Blocking wrapper around `run` for callers without an async runtime.
    ///
    /// Must not be called from inside a Tokio runtime. Timed-out engine
    /// threads are left to finish in the background rather than awaited.
    pub fn run_blocking(&self, raw: &RawDocument) -> ExtractionResult {
        let start = Instant::now();
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                return ExtractionResult::failure(
                    format!("Failed to start extraction runtime: {}", e),
                    start.elapsed(),
                    ResultContext::default(),
                )
            }
        };

        let result = runtime.block_on(self.run(raw));
        runtime.shutdown_background();
        result
    }

    async fn single(
        &self,
        engine: &TimedEngine,
        role: EngineRole,
        image: Arc<DynamicImage>,
        ctx: &mut ResultContext,
    ) -> Result<Selected, EngineError> {
        let (outcome, attempt) = invoke(engine, role, image).await;
        ctx.attempts.push(attempt);
        outcome.map(|output| Selected {
            engine_used: role.into(),
            output,
        })
    }

    async fn sequential(
        &self,
        primary: &TimedEngine,
        secondary: &TimedEngine,
        image: Arc<DynamicImage>,
        ctx: &mut ResultContext,
    ) -> Result<Selected, EngineError> {
        let threshold = self.config.confidence_threshold;

        let (first, attempt) = invoke(primary, EngineRole::Primary, Arc::clone(&image)).await;
        ctx.attempts.push(attempt);

        let first = match first {
            Ok(output) if output.mean_confidence >= threshold => {
                tracing::debug!(
                    "Primary confidence {:.2} meets threshold {:.2}, skipping secondary",
                    output.mean_confidence,
                    threshold
                );
                return Ok(Selected {
                    engine_used: EngineUsed::Primary,
                    output,
                });
            }
            other => other,
        };

        match &first {
            Ok(output) => tracing::info!(
                "Primary confidence {:.2} below threshold {:.2}, invoking secondary engine",
                output.mean_confidence,
                threshold
            ),
            Err(e) => tracing::info!("Primary engine failed ({}), invoking secondary engine", e),
        }

        let (second, attempt) = invoke(secondary, EngineRole::Secondary, image).await;
        ctx.attempts.push(attempt);

        select(first, second, threshold, ctx)
    }

    async fn concurrent(
        &self,
        primary: &TimedEngine,
        secondary: &TimedEngine,
        image: Arc<DynamicImage>,
        ctx: &mut ResultContext,
    ) -> Result<Selected, EngineError> {
        let ((first, first_attempt), (second, second_attempt)) = futures::future::join(
            invoke(primary, EngineRole::Primary, Arc::clone(&image)),
            invoke(secondary, EngineRole::Secondary, image),
        )
        .await;
        ctx.attempts.push(first_attempt);
        ctx.attempts.push(second_attempt);

        select(first, second, self.config.confidence_threshold, ctx)
    }

    fn finish(&self, result: ExtractionResult) -> ExtractionResult {
        match result.error_message() {
            None => tracing::info!(
                "Extraction completed in {:.3}s via {} engine, confidence: {:.2}, quality: {}, text length: {}",
                result.processing_time_seconds(),
                result.engine_used().as_str(),
                result.confidence_score(),
                result.quality_assessment(),
                result.original_text().len()
            ),
            Some(message) => tracing::warn!(
                "Extraction failed after {:.3}s: {}",
                result.processing_time_seconds(),
                message
            ),
        }
        result
    }
}

/// Invoke one engine and record the attempt
async fn invoke(
    engine: &TimedEngine,
    role: EngineRole,
    image: Arc<DynamicImage>,
) -> (Result<EngineOutput, EngineError>, EngineAttempt) {
    let start = Instant::now();
    let outcome = engine.extract(image).await;

    let attempt = EngineAttempt {
        engine: engine.name(),
        role,
        outcome: match &outcome {
            Ok(_) => AttemptOutcome::Succeeded,
            Err(e) if e.is_timeout() => AttemptOutcome::TimedOut,
            Err(_) => AttemptOutcome::Failed,
        },
        confidence: outcome.as_ref().ok().map(|o| o.mean_confidence),
        elapsed_seconds: start.elapsed().as_secs_f64(),
        error: outcome.as_ref().err().map(|e| e.to_string()),
    };

    (outcome, attempt)
}

/// Choose between a primary and a secondary outcome.
///
/// Both above threshold: `Both`, higher confidence wins, ties go to the
/// primary. Otherwise the secondary needs strictly higher confidence, or a
/// failed primary, to win.
fn select(
    primary: Result<EngineOutput, EngineError>,
    secondary: Result<EngineOutput, EngineError>,
    threshold: f32,
    ctx: &mut ResultContext,
) -> Result<Selected, EngineError> {
    match (primary, secondary) {
        (Ok(p), Ok(s)) => {
            if p.mean_confidence >= threshold && s.mean_confidence >= threshold {
                let output = if s.mean_confidence > p.mean_confidence { s } else { p };
                Ok(Selected {
                    engine_used: EngineUsed::Both,
                    output,
                })
            } else if s.mean_confidence > p.mean_confidence {
                Ok(Selected {
                    engine_used: EngineUsed::Secondary,
                    output: s,
                })
            } else {
                Ok(Selected {
                    engine_used: EngineUsed::Primary,
                    output: p,
                })
            }
        }
        (Ok(p), Err(e)) => {
            ctx.warnings
                .push(format!("Secondary engine result discarded: {}", e));
            Ok(Selected {
                engine_used: EngineUsed::Primary,
                output: p,
            })
        }
        (Err(e), Ok(s)) => {
            ctx.warnings
                .push(format!("Primary engine result discarded: {}", e));
            Ok(Selected {
                engine_used: EngineUsed::Secondary,
                output: s,
            })
        }
        (Err(_), Err(e)) => Err(e),
    }
}
