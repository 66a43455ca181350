//! Backend capability probe
//!
//! Detects which extraction engines and preprocessing steps are usable in
//! the current build and runtime environment. Detection never fails: any
//! missing backend is simply reported as unavailable.

use crate::engines;
use serde::Serialize;
use std::sync::OnceLock;

static CAPABILITIES: OnceLock<CapabilitySet> = OnceLock::new();

/// Which backends are usable in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub primary_available: bool,
    pub secondary_available: bool,
    pub preprocessing_available: bool,
}

impl CapabilitySet {
    /// A set with every backend unavailable
    pub const NONE: CapabilitySet = CapabilitySet {
        primary_available: false,
        secondary_available: false,
        preprocessing_available: false,
    };

    /// Run detection without consulting the process-wide memo.
    ///
    /// Idempotent and side-effect free apart from the engines' own cheap
    /// runtime checks, so harnesses may call it whenever the environment changes.
    pub fn detect() -> Self {
        let set = Self {
            primary_available: engines::primary_supported(),
            secondary_available: engines::secondary_supported(),
            preprocessing_available: cfg!(feature = "preprocessing"),
        };
        tracing::debug!(
            primary = set.primary_available,
            secondary = set.secondary_available,
            preprocessing = set.preprocessing_available,
            "capability detection finished"
        );
        set
    }

    pub fn any_engine(&self) -> bool {
        self.primary_available || self.secondary_available
    }

    /// Keep only the capabilities present in both sets
    pub fn intersect(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet {
            primary_available: self.primary_available && other.primary_available,
            secondary_available: self.secondary_available && other.secondary_available,
            preprocessing_available: self.preprocessing_available
                && other.preprocessing_available,
        }
    }
}

/// Process-wide capability set, computed on first use.
pub fn probe() -> CapabilitySet {
    *CAPABILITIES.get_or_init(|| {
        let set = CapabilitySet::detect();
        tracing::info!(
            "Backend capabilities: primary={}, secondary={}, preprocessing={}",
            set.primary_available,
            set.secondary_available,
            set.preprocessing_available
        );
        set
    })
}
