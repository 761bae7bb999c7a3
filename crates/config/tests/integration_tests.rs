//! Integration tests for the configuration system

use audioshelf_config::{
    AppConfig, Config, ConfigManager, ConfigSection, LibraryConfig, LogLevel, MatchingConfig,
    ReconcileConfig, StateConfig, CONFIG_VERSION, DEFAULT_NAMING_TEMPLATE,
};
use audioshelf_core::AppError;
use std::path::PathBuf;
use tempfile::TempDir;

fn setup_test_manager() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ConfigManager::with_directory(temp_dir.path());
    (temp_dir, manager)
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (temp_dir, manager) = setup_test_manager();

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.reconcile.concurrency = 2;
    modified.library.root = Some(temp_dir.path().to_path_buf());
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.reconcile.concurrency, 2);
    assert_eq!(reloaded.library.root.as_deref(), Some(temp_dir.path()));

    manager.reset()?;
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_all_sections_default_are_valid() {
    assert!(AppConfig::default().validate().is_ok());
    assert!(StateConfig::default().validate().is_ok());
    assert!(LibraryConfig::default().validate().is_ok());
    assert!(MatchingConfig::default().validate().is_ok());
    assert!(ReconcileConfig::default().validate().is_ok());
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_documented_defaults() {
    let config = Config::default();
    assert_eq!(config.app.log_level, LogLevel::Info);
    assert_eq!(config.state.max_retries, 3);
    assert_eq!(config.library.library_id, "default");
    assert_eq!(config.library.naming_template, DEFAULT_NAMING_TEMPLATE);
    assert_eq!(config.matching.similarity_threshold, 0.6);
    assert_eq!(config.matching.duplicate_threshold, 0.88);
    assert_eq!(config.reconcile.concurrency, 8);
    assert!(!config.reconcile.search_enabled);
    assert_eq!(config.reconcile.confidence_threshold, 0.8);
    assert_eq!(config.reconcile.bitrate_noise_ratio, 0.15);
    assert_eq!(config.reconcile.duration_tolerance, 0.20);
    assert_eq!(config.reconcile.search_timeout().as_secs(), 5);
}

#[test]
fn test_search_requires_catalog() {
    let mut config = Config::default();
    config.reconcile.search_enabled = true;

    let errors = config.validate().expect_err("catalog missing");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "reconcile.catalog_path");

    config.reconcile.catalog_path = Some(PathBuf::from("catalog.json"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_error_converts_to_configuration_error() {
    let mut config = Config::default();
    config.matching.similarity_threshold = -0.1;

    let errors = config.validate().expect_err("invalid threshold");
    let app_error: AppError = errors[0].clone().into();
    match app_error {
        AppError::Configuration { setting, .. } => {
            assert_eq!(setting, "matching.similarity_threshold")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_file_written_as_sectioned_toml() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager();
    manager.initialize()?;

    let contents = std::fs::read_to_string(manager.config_path())?;
    for section in ["[app]", "[state]", "[library]", "[matching]", "[reconcile]"] {
        assert!(contents.contains(section), "missing {}", section);
    }

    let parsed: Config = toml::from_str(&contents)?;
    assert_eq!(parsed, Config::default());
    Ok(())
}

#[test]
fn test_update_closure() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager();
    manager.initialize()?;

    manager.update(|config| {
        config.app.log_level = LogLevel::Debug;
        config.reconcile.search_timeout_secs = 10;
    })?;

    let config = manager.load()?;
    assert_eq!(config.app.log_level, LogLevel::Debug);
    assert_eq!(config.reconcile.search_timeout_secs, 10);
    Ok(())
}

#[test]
fn test_merge_keeps_paths_when_override_has_none() {
    let mut base = Config::default();
    base.library.archive_dir = Some(PathBuf::from("/srv/archive"));

    let mut overrides = Config::default();
    overrides.reconcile.concurrency = 1;
    base.merge(overrides);

    assert_eq!(base.library.archive_dir, Some(PathBuf::from("/srv/archive")));
    assert_eq!(base.reconcile.concurrency, 1);
}
