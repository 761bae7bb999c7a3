//! File system persistence for configuration
//!
//! Writes go to a temporary file that is renamed into place; the previous
//! file is copied to `<name>.toml.backup` first.

use crate::{migration, Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads and writes one config file
pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    ///
    /// A missing file yields defaults. An empty or unparseable file is an
    /// error. Older versions are migrated and written back. Validation
    /// problems are logged, not raised; callers decide whether they are fatal.
    pub fn load(&self) -> ConfigResult<Config> {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "Config file not found at {}, using defaults",
                    self.config_path.display()
                );
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::ReadError {
                    path: self.config_path.clone(),
                    source,
                })
            }
        };

        // Whitespace-only files are treated as damaged, not as defaults
        if contents.trim().is_empty() {
            return Err(ConfigError::ReadError {
                path: self.config_path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Config file is empty or contains only whitespace",
                ),
            });
        }

        let parse_error = |source| ConfigError::ParseError {
            path: self.config_path.clone(),
            source,
        };
        let table: toml::Table = toml::from_str(&contents).map_err(parse_error)?;

        let config = if migration::table_version(&table)? < CONFIG_VERSION {
            let config = migration::migrate_to_latest(table)?;
            log::info!("Saving migrated config");
            self.save(&config)?;
            config
        } else {
            toml::from_str(&contents).map_err(parse_error)?
        };

        if let Err(errors) = config.validate() {
            let error_msg = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            log::warn!("Config validation warnings: {}", error_msg);
        }

        Ok(config)
    }

    /// Validates, backs up the previous file and writes atomically
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        if let Err(errors) = config.validate() {
            let error_msg = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConfigError::ValidationError(error_msg));
        }

        let dir = self.parent_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| ConfigError::DirectoryCreationError {
                path: dir.clone(),
                source: e,
            })?;
            log::info!("Created config directory: {}", dir.display());
        }

        if self.config_path.exists() {
            let backup_path = self.backup_path();
            fs::copy(&self.config_path, &backup_path)
                .map_err(|e| ConfigError::BackupError { source: e })?;
            log::debug!("Backed up config to {}", backup_path.display());
        }

        let toml_string = toml::to_string_pretty(config)?;
        let mut temp_file = NamedTempFile::new_in(&dir)?;
        temp_file.write_all(toml_string.as_bytes())?;
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file
            .persist(&self.config_path)
            .map_err(|e| ConfigError::WriteError {
                path: self.config_path.clone(),
                source: e.error,
            })?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// Writes a default config file
    pub fn write_defaults(&self) -> ConfigResult<()> {
        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path.display());
        Ok(())
    }

    pub fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.backup")
    }

    fn parent_dir(&self) -> ConfigResult<PathBuf> {
        match self.config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.to_path_buf()),
            Some(_) => Ok(PathBuf::from(".")),
            None => Err(ConfigError::PathResolutionError {
                reason: "Config path has no parent directory".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.toml");
        (temp_dir, config_path)
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let config = persistence.load().expect("Should load default config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let mut config = Config::default();
        config.reconcile.concurrency = 3;
        config.library.library_id = "audiobooks".to_string();

        persistence.save(&config).expect("Should save config");
        let loaded = persistence.load().expect("Should load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("subdir").join("config.toml");
        let persistence = ConfigPersistence::new(config_path.clone());

        persistence
            .save(&Config::default())
            .expect("Should create directory and save");

        assert!(config_path.exists());
    }

    #[test]
    fn test_backup_created_on_overwrite() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        persistence.save(&Config::default()).expect("Should save config");
        persistence.save(&Config::default()).expect("Should save config again");

        assert!(persistence.backup_path().exists());
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "this is not valid TOML {{{").expect("Should write file");

        let result = ConfigPersistence::new(config_path).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_empty_file_is_error() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(&config_path, "\n  \n").expect("Should write file");

        let result = ConfigPersistence::new(config_path).load();
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_validate_before_save() {
        let (_temp_dir, config_path) = setup_test_dir();
        let persistence = ConfigPersistence::new(config_path);

        let mut config = Config::default();
        config.reconcile.concurrency = 0;

        let result = persistence.save(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(
            &config_path,
            "version = 1\n[reconcile]\nconcurrency = 2\nsearch_enabled = false\n",
        )
        .expect("Should write file");

        let config = ConfigPersistence::new(config_path).load().expect("Should load");
        assert_eq!(config.reconcile.concurrency, 2);
        assert_eq!(config.reconcile.confidence_threshold, 0.8);
        assert_eq!(config.matching.similarity_threshold, 0.6);
    }

    #[test]
    fn test_version_zero_file_is_migrated_and_rewritten() {
        let (_temp_dir, config_path) = setup_test_dir();
        fs::write(
            &config_path,
            "version = 0\n[pipeline]\nworkers = 6\nsearch_timeout_ms = 400\n",
        )
        .expect("Should write file");
        let persistence = ConfigPersistence::new(config_path.clone());

        let config = persistence.load().expect("Should migrate");
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.reconcile.concurrency, 6);
        assert_eq!(config.reconcile.search_timeout_secs, 1);

        let written = fs::read_to_string(&config_path).expect("Should read file");
        assert!(written.contains("[reconcile]"));
        assert!(!written.contains("[pipeline]"));
        assert!(persistence.backup_path().exists());
        assert_eq!(persistence.load().expect("Should reload"), config);
    }
}
