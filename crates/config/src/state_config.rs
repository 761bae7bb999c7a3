//! State file configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where reconciliation state lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// JSON state document; lock files sit beside it
    pub path: PathBuf,

    /// Failures retried at most this many times by `failed_for_retry`
    pub max_retries: u32,
}

impl StateConfig {
    /// `<platform data dir>/state.json`, or `./audioshelf-state.json` when
    /// the platform has no data directory
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "audioshelf")
            .map(|dirs| dirs.data_dir().join("state.json"))
            .unwrap_or_else(|| PathBuf::from("audioshelf-state.json"))
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            max_retries: 3,
        }
    }
}

impl ConfigSection for StateConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if self.path.as_os_str().is_empty() {
            results.push(Err(ValidationError::new("state.path", "must not be empty")));
        }
        if self.path.is_dir() {
            results.push(Err(ValidationError::with_value(
                "state.path",
                "must be a file path, not a directory",
                self.path.display(),
            )));
        }
        results.push(Validator::in_range(self.max_retries, 0, 100, "state.max_retries"));

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.path = other.path;
        self.max_retries = other.max_retries;
    }

    fn section_name(&self) -> &'static str {
        "state"
    }
}
