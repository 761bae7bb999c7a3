//! audioshelf configuration
//!
//! A TOML file with one table per concern. Sections implement
//! [`ConfigSection`], so adding a section means adding a type, not editing
//! the loader.
//!
//! # Example
//!
//! ```rust,no_run
//! use audioshelf_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Workers: {}", config.reconcile.concurrency);
//! ```

mod error;
mod manager;
mod migration;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
mod library_config;
mod matching_config;
mod reconcile_config;
mod state_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use library_config::{LibraryConfig, DEFAULT_NAMING_TEMPLATE};
pub use matching_config::MatchingConfig;
pub use reconcile_config::ReconcileConfig;
pub use state_config::StateConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version for migrations
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    pub app: AppConfig,

    pub state: StateConfig,

    pub library: LibraryConfig,

    pub matching: MatchingConfig,

    pub reconcile: ReconcileConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        collect(&self.app, &mut errors);
        collect(&self.state, &mut errors);
        collect(&self.library, &mut errors);
        collect(&self.matching, &mut errors);
        collect(&self.reconcile, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    ///
    /// This is used for override chains: defaults < file < CLI args
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.state.merge(other.state);
        self.library.merge(other.library);
        self.matching.merge(other.matching);
        self.reconcile.merge(other.reconcile);
    }
}

fn collect(section: &impl ConfigSection, errors: &mut Vec<ValidationError>) {
    if let Err(mut e) = section.validate() {
        log::debug!("Section [{}] has {} problem(s)", section.section_name(), e.len());
        errors.append(&mut e);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            state: StateConfig::default(),
            library: LibraryConfig::default(),
            matching: MatchingConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}
