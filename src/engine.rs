use crate::error::EngineError;
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Axis-aligned box in pixel coordinates of the image the engine saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box covering both `self` and `other`
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        BoundingBox::new(x, y, right - x, bottom - y)
    }
}

/// One detected text region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub bounding_box: BoundingBox,
    pub text: String,
    pub confidence: f32,
}

/// Raw output of a single engine invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub text: String,
    pub regions: Vec<Region>,
    pub mean_confidence: f32,
    /// True when `regions` are in reading order rather than detection order
    pub reading_order: bool,
}

impl EngineOutput {
    /// Clamp confidences into [0, 1]; NaN becomes 0.
    pub fn sanitized(mut self) -> Self {
        self.mean_confidence = clamp_confidence(self.mean_confidence);
        for region in &mut self.regions {
            region.confidence = clamp_confidence(region.confidence);
        }
        self
    }
}

pub(crate) fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Trait that all extraction engines must implement
///
/// Implementations are synchronous and may block; `TimedEngine` moves them
/// onto the blocking pool and enforces the timeout.
pub trait TextEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize text in a decoded image. Must not retain `image`.
    fn extract(&self, image: &DynamicImage) -> Result<EngineOutput, EngineError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String> {
        vec!["eng".to_string()]
    }
}

/// Engine adapter that enforces a hard per-invocation timeout.
#[derive(Clone)]
pub struct TimedEngine {
    engine: Arc<dyn TextEngine>,
    timeout: Duration,
}

impl TimedEngine {
    pub fn new(engine: Arc<dyn TextEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn description(&self) -> &'static str {
        self.engine.description()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the engine on the blocking pool. A timed-out invocation is
    /// abandoned: its thread finishes in the background and the output is
    /// dropped.
    pub async fn extract(&self, image: Arc<DynamicImage>) -> Result<EngineOutput, EngineError> {
        let engine = Arc::clone(&self.engine);
        let name = engine.name();
        let start = Instant::now();

        let task = tokio::task::spawn_blocking(move || engine.extract(&image));

        let outcome = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                tracing::warn!(
                    "{} engine exceeded its {:.2}s timeout, discarding output",
                    name,
                    self.timeout.as_secs_f64()
                );
                Err(EngineError::Timeout {
                    engine: name,
                    timeout: self.timeout,
                })
            }
            Ok(Err(join_error)) => Err(EngineError::failure(
                name,
                format!("engine task aborted: {}", join_error),
            )),
            Ok(Ok(result)) => result.map(EngineOutput::sanitized),
        };

        tracing::debug!(
            engine = name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "engine invocation finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    struct Sleepy(Duration);

    impl TextEngine for Sleepy {
        fn name(&self) -> &'static str {
            "sleepy"
        }

        fn description(&self) -> &'static str {
            "sleeps before answering"
        }

        fn extract(&self, _image: &DynamicImage) -> Result<EngineOutput, EngineError> {
            std::thread::sleep(self.0);
            Ok(EngineOutput {
                text: "late".to_string(),
                regions: vec![],
                mean_confidence: 1.7,
                reading_order: true,
            })
        }
    }

    struct Panicky;

    impl TextEngine for Panicky {
        fn name(&self) -> &'static str {
            "panicky"
        }

        fn description(&self) -> &'static str {
            "panics inside the native call"
        }

        fn extract(&self, _image: &DynamicImage) -> Result<EngineOutput, EngineError> {
            panic!("native library crashed");
        }
    }

    fn blank() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageLuma8(GrayImage::new(4, 4)))
    }

    #[test]
    fn test_union_covers_both_boxes() {
        let a = BoundingBox::new(10, 10, 5, 5);
        let b = BoundingBox::new(2, 12, 4, 10);
        assert_eq!(a.union(&b), BoundingBox::new(2, 10, 13, 12));
    }

    #[test]
    fn test_sanitized_clamps_confidence() {
        let output = EngineOutput {
            text: "x".to_string(),
            regions: vec![Region {
                bounding_box: BoundingBox::new(0, 0, 1, 1),
                text: "x".to_string(),
                confidence: f32::NAN,
            }],
            mean_confidence: -0.2,
            reading_order: false,
        }
        .sanitized();
        assert_eq!(output.mean_confidence, 0.0);
        assert_eq!(output.regions[0].confidence, 0.0);
    }

    #[tokio::test]
    async fn test_timeout_discards_output() {
        let engine = TimedEngine::new(
            Arc::new(Sleepy(Duration::from_millis(400))),
            Duration::from_millis(50),
        );
        let err = engine.extract(blank()).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_within_timeout_returns_sanitized_output() {
        let engine = TimedEngine::new(
            Arc::new(Sleepy(Duration::from_millis(1))),
            Duration::from_secs(5),
        );
        let output = engine.extract(blank()).await.unwrap();
        assert_eq!(output.text, "late");
        assert_eq!(output.mean_confidence, 1.0);
    }

    #[tokio::test]
    async fn test_panicking_engine_becomes_failure() {
        let engine = TimedEngine::new(Arc::new(Panicky), Duration::from_secs(5));
        let err = engine.extract(blank()).await.unwrap_err();
        assert!(matches!(err, EngineError::Failure { engine: "panicky", .. }));
    }
}
