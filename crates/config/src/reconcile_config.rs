//! Reconciliation pipeline configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Worker pool width; sized for I/O waits, not CPU count
    pub concurrency: usize,

    /// Resolve folders without an embedded identity by catalog search
    pub search_enabled: bool,

    /// JSON catalog used for search and canonical metadata
    pub catalog_path: Option<PathBuf>,

    /// Minimum search confidence to accept a resolution
    pub confidence_threshold: f64,

    /// Per-call search timeout
    pub search_timeout_secs: u64,

    /// Bitrate differences at or below this ratio are noise
    pub bitrate_noise_ratio: f64,

    /// Duration differences above this ratio mean a different edition
    pub duration_tolerance: f64,
}

impl ReconcileConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            search_enabled: false,
            catalog_path: None,
            confidence_threshold: 0.8,
            search_timeout_secs: 5,
            bitrate_noise_ratio: 0.15,
            duration_tolerance: 0.20,
        }
    }
}

impl ConfigSection for ReconcileConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.concurrency, 1, 64, "reconcile.concurrency"),
            Validator::unit_interval(self.confidence_threshold, "reconcile.confidence_threshold"),
            Validator::in_range(self.search_timeout_secs, 1, 120, "reconcile.search_timeout_secs"),
            Validator::unit_interval(self.bitrate_noise_ratio, "reconcile.bitrate_noise_ratio"),
            Validator::unit_interval(self.duration_tolerance, "reconcile.duration_tolerance"),
        ];

        if self.search_enabled && self.catalog_path.is_none() {
            results.push(Err(ValidationError::new(
                "reconcile.catalog_path",
                "required when search_enabled is true",
            )));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.concurrency = other.concurrency;
        self.search_enabled = other.search_enabled;
        if other.catalog_path.is_some() {
            self.catalog_path = other.catalog_path;
        }
        self.confidence_threshold = other.confidence_threshold;
        self.search_timeout_secs = other.search_timeout_secs;
        self.bitrate_noise_ratio = other.bitrate_noise_ratio;
        self.duration_tolerance = other.duration_tolerance;
    }

    fn section_name(&self) -> &'static str {
        "reconcile"
    }
}
