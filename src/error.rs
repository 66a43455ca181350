use std::time::Duration;
use thiserror::Error;

/// Message reported when no engine can be invoked for a document.
pub const NO_ENGINE_AVAILABLE: &str = "no extraction backend available";

/// Construction-time errors. Nothing in this enum escapes `Extractor::run`.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from a single engine invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{engine} engine is not available in this environment")]
    CapabilityUnavailable { engine: &'static str },

    #[error("{engine} engine timed out after {:.2}s", timeout.as_secs_f64())]
    Timeout {
        engine: &'static str,
        timeout: Duration,
    },

    #[error("{engine} engine failed: {message}")]
    Failure {
        engine: &'static str,
        message: String,
    },
}

impl EngineError {
    pub fn failure(engine: &'static str, message: impl Into<String>) -> Self {
        Self::Failure {
            engine,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors from decoding or preprocessing a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode document: {0}")]
    Decode(String),

    #[error("Preprocessing step '{step}' failed: {message}")]
    Step { step: &'static str, message: String },
}

impl PreprocessError {
    pub fn step(step: &'static str, message: impl Into<String>) -> Self {
        Self::Step {
            step,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_mentions_timeout() {
        let err = EngineError::Timeout {
            engine: "ocrs",
            timeout: Duration::from_millis(1500),
        };
        let message = err.to_string();
        assert!(message.contains("timed out"), "got: {}", message);
        assert!(message.contains("1.50s"), "got: {}", message);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_failure_message_includes_engine() {
        let err = EngineError::failure("leptess", "bad image");
        assert_eq!(err.to_string(), "leptess engine failed: bad image");
        assert!(!err.is_timeout());
    }
}
