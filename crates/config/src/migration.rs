//! Config file format upgrades
//!
//! Each step rewrites the raw TOML table from version `n - 1` to `n`, before
//! the table is read as a [`Config`]. Steps run in order until the table
//! reaches [`CONFIG_VERSION`].
//!
//! Version 0 kept the reconcile settings in a `[pipeline]` table, with
//! `workers` for the worker count and `search_timeout_ms` in milliseconds,
//! and called the safety-gate threshold `[matching] threshold`.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};

type Step = fn(&mut toml::Table) -> ConfigResult<()>;

/// `(target version, step)`, ascending
const STEPS: &[(u32, Step)] = &[(1, pipeline_to_reconcile)];

/// Version recorded in a raw config table; a table without one is current
pub fn table_version(table: &toml::Table) -> ConfigResult<u32> {
    match table.get("version") {
        None => Ok(CONFIG_VERSION),
        Some(value) => value
            .as_integer()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ConfigError::ValidationError(format!("invalid version: {}", value))),
    }
}

/// Upgrades a raw config table to the latest version and reads it
pub fn migrate_to_latest(mut table: toml::Table) -> ConfigResult<Config> {
    let version = table_version(&table)?;

    if version > CONFIG_VERSION {
        log::warn!(
            "Config version {} is newer than supported version {}. Attempting to use as-is.",
            version,
            CONFIG_VERSION
        );
    } else if version < CONFIG_VERSION {
        log::info!(
            "Migrating config from version {} to {}",
            version,
            CONFIG_VERSION
        );

        for (target, step) in STEPS
            .iter()
            .filter(|(target, _)| *target > version && *target <= CONFIG_VERSION)
        {
            step(&mut table)?;
            log::info!("Applied config migration to version {}", target);
        }

        table.insert(
            "version".to_string(),
            toml::Value::Integer(i64::from(CONFIG_VERSION)),
        );
    }

    toml::Value::Table(table)
        .try_into()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
}

/// 0 -> 1: `[pipeline]` becomes `[reconcile]`, and `[matching] threshold`
/// becomes `similarity_threshold`
fn pipeline_to_reconcile(table: &mut toml::Table) -> ConfigResult<()> {
    if let Some(pipeline) = table.remove("pipeline") {
        let toml::Value::Table(mut pipeline) = pipeline else {
            return Err(ConfigError::ValidationError(
                "[pipeline] must be a table".to_string(),
            ));
        };

        if let Some(workers) = pipeline.remove("workers") {
            pipeline.insert("concurrency".to_string(), workers);
        }
        if let Some(millis) = pipeline.remove("search_timeout_ms") {
            let millis = millis.as_integer().ok_or_else(|| {
                ConfigError::ValidationError(format!("invalid search_timeout_ms: {}", millis))
            })?;
            // Round up so a sub-second timeout does not become zero
            let secs = (millis.max(1) + 999) / 1000;
            pipeline.insert("search_timeout_secs".to_string(), toml::Value::Integer(secs));
        }

        let reconcile = table
            .entry("reconcile")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(reconcile) = reconcile {
            for (key, value) in pipeline {
                reconcile.entry(key).or_insert(value);
            }
        }
    }

    if let Some(toml::Value::Table(matching)) = table.get_mut("matching") {
        if let Some(threshold) = matching.remove("threshold") {
            matching
                .entry("similarity_threshold")
                .or_insert(threshold);
        }
    }

    Ok(())
}
