//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult, LogLevel};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variables recognised by [`ConfigManager::load_with_env_overrides`]
pub const ENV_LOG_LEVEL: &str = "AUDIOSHELF_APP_LOG_LEVEL";
pub const ENV_STATE_PATH: &str = "AUDIOSHELF_STATE_PATH";
pub const ENV_LIBRARY_ROOT: &str = "AUDIOSHELF_LIBRARY_ROOT";
pub const ENV_CONCURRENCY: &str = "AUDIOSHELF_RECONCILE_CONCURRENCY";

/// Main configuration manager
///
/// Owns the location of the config file and the load/save/override chain.
pub struct ConfigManager {
    persistence: ConfigPersistence,
}

impl ConfigManager {
    /// Creates a manager for the platform config directory
    ///
    /// - Linux: `~/.config/audioshelf/config.toml`
    /// - macOS: `~/Library/Application Support/audioshelf/config.toml`
    /// - Windows: `%APPDATA%\audioshelf\config.toml`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self::with_directory(config_dir))
    }

    /// Creates a manager for `<dir>/config.toml`
    pub fn with_directory(config_dir: impl AsRef<Path>) -> Self {
        Self::with_file(config_dir.as_ref().join(CONFIG_FILE_NAME))
    }

    /// Creates a manager for an explicit file, as given by `--config`
    pub fn with_file(config_path: impl Into<PathBuf>) -> Self {
        Self {
            persistence: ConfigPersistence::new(config_path.into()),
        }
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "audioshelf")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })
    }

    pub fn config_path(&self) -> &Path {
        self.persistence.path()
    }

    /// Loads the file; a missing file yields defaults, a damaged one an error
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the file, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, applies `update_fn` and saves
    ///
    /// ```rust,no_run
    /// # use audioshelf_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.reconcile.concurrency = 4;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default file unless one exists; returns whether it wrote
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.persistence.write_defaults()?;
        Ok(true)
    }

    /// Overwrites the file with defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validation messages for the file on disk; empty when valid
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the file and applies `AUDIOSHELF_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }
}

/// Applies overrides from `lookup`, which maps a variable name to its value
///
/// A value that does not parse is an error rather than silently ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.app.log_level = level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::ValidationError(format!("{}: {}", ENV_LOG_LEVEL, e)))?;
    }

    if let Some(path) = lookup(ENV_STATE_PATH) {
        config.state.path = PathBuf::from(path);
    }

    if let Some(root) = lookup(ENV_LIBRARY_ROOT) {
        config.library.root = Some(PathBuf::from(root));
    }

    if let Some(concurrency) = lookup(ENV_CONCURRENCY) {
        config.reconcile.concurrency = concurrency.trim().parse::<usize>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "{}: expected a positive integer, got '{}'",
                ENV_CONCURRENCY, concurrency
            ))
        })?;
    }

    if let Err(errors) = config.validate() {
        log::warn!(
            "Config validation warnings after env overrides: {:?}",
            errors
        );
    }

    Ok(())
}
