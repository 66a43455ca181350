//! Extraction engine implementations
//!
//! This module contains implementations of the TextEngine trait for the two
//! engine roles. Engines are conditionally compiled based on feature flags:
//! the primary role is filled by ocrs, the secondary by Tesseract.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

#[cfg(feature = "model-download")]
mod download;

pub mod heuristics;

use crate::capability::CapabilitySet;
use crate::config::Config;
use crate::engine::TextEngine;
use serde::Serialize;
use std::sync::Arc;

/// The slot an engine fills in the fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineRole {
    Primary,
    Secondary,
}

impl EngineRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Information about an initialized engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub role: EngineRole,
    pub name: &'static str,
    pub description: &'static str,
    pub supported_languages: Vec<String>,
}

/// Whether the primary engine is compiled in and its runtime check passes
pub fn primary_supported() -> bool {
    #[cfg(feature = "engine-ocrs")]
    {
        ocrs::runtime_check()
    }
    #[cfg(not(feature = "engine-ocrs"))]
    {
        false
    }
}

/// Whether the secondary engine is compiled in and its runtime check passes
pub fn secondary_supported() -> bool {
    #[cfg(feature = "engine-leptess")]
    {
        leptess::runtime_check()
    }
    #[cfg(not(feature = "engine-leptess"))]
    {
        false
    }
}

/// Engines initialized for the available capabilities
#[derive(Clone, Default)]
pub struct EngineSet {
    pub primary: Option<Arc<dyn TextEngine>>,
    pub secondary: Option<Arc<dyn TextEngine>>,
}

impl EngineSet {
    /// Initialize the engines the capability set and configuration allow.
    ///
    /// An engine whose initialization fails is logged and left out rather
    /// than failing the whole set.
    pub fn initialize(config: &Config, capabilities: &CapabilitySet) -> Self {
        let mut set = EngineSet::default();

        if capabilities.primary_available && config.enable_primary {
            set.primary = init_primary(config);
        }
        if capabilities.secondary_available && config.enable_secondary {
            set.secondary = init_secondary(config);
        }

        set
    }

    /// Capabilities actually backed by an engine in this set.
    ///
    /// Preprocessing is not an engine concern and stays set, so intersecting
    /// with a probed set leaves that flag untouched.
    pub fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            primary_available: self.primary.is_some(),
            secondary_available: self.secondary.is_some(),
            preprocessing_available: true,
        }
    }

    /// Get info about all initialized engines
    pub fn info(&self) -> Vec<EngineInfo> {
        [
            (EngineRole::Primary, &self.primary),
            (EngineRole::Secondary, &self.secondary),
        ]
        .into_iter()
        .filter_map(|(role, engine)| {
            engine.as_ref().map(|e| EngineInfo {
                role,
                name: e.name(),
                description: e.description(),
                supported_languages: e.supported_languages(),
            })
        })
        .collect()
    }
}

#[cfg(feature = "engine-ocrs")]
fn init_primary(config: &Config) -> Option<Arc<dyn TextEngine>> {
    tracing::info!("Initializing ocrs engine...");
    match ocrs::OcrsEngine::new(config) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!("Primary engine unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "engine-ocrs"))]
fn init_primary(_config: &Config) -> Option<Arc<dyn TextEngine>> {
    None
}

#[cfg(feature = "engine-leptess")]
fn init_secondary(config: &Config) -> Option<Arc<dyn TextEngine>> {
    tracing::info!("Initializing leptess engine...");
    match leptess::LeptessEngine::new(config) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!("Secondary engine unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "engine-leptess"))]
fn init_secondary(_config: &Config) -> Option<Arc<dyn TextEngine>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_capabilities_yields_empty_set() {
        let set = EngineSet::initialize(&Config::default(), &CapabilitySet::NONE);
        assert!(set.primary.is_none());
        assert!(set.secondary.is_none());
        assert!(set.info().is_empty());
        assert!(!set.capabilities().any_engine());
    }

    #[test]
    fn test_disabled_engines_are_not_initialized() {
        let config = Config {
            enable_primary: false,
            enable_secondary: false,
            ..Config::default()
        };
        let all = CapabilitySet {
            primary_available: true,
            secondary_available: true,
            preprocessing_available: true,
        };
        let set = EngineSet::initialize(&config, &all);
        assert!(set.primary.is_none());
        assert!(set.secondary.is_none());
    }
}
