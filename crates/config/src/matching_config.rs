//! Similarity threshold configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Combined title/author similarity below which a rename is flagged
    pub similarity_threshold: f64,

    /// Similarity at or above which two library entries are duplicates
    pub duplicate_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            duplicate_threshold: 0.88,
        }
    }
}

impl ConfigSection for MatchingConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::unit_interval(self.similarity_threshold, "matching.similarity_threshold"),
            Validator::unit_interval(self.duplicate_threshold, "matching.duplicate_threshold"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.similarity_threshold = other.similarity_threshold;
        self.duplicate_threshold = other.duplicate_threshold;
    }

    fn section_name(&self) -> &'static str {
        "matching"
    }
}
