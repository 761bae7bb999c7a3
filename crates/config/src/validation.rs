//! Validation for configuration values
//!
//! Each config section implements [`ConfigSection`], so new sections slot into
//! `Config::validate` without touching the others.

pub use crate::error::ValidationError;
use std::path::Path;

/// A self-validating, mergeable configuration section
pub trait ConfigSection: Default {
    /// Returns every problem found; empty means valid
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Merges another section into this one; values from `other` win
    fn merge(&mut self, other: Self);

    /// Returns the section name for error reporting
    fn section_name(&self) -> &'static str;
}

/// Common validators for config values
pub struct Validator;

impl Validator {
    /// Validates that a numeric value is within an inclusive range
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        } else {
            Ok(())
        }
    }

    /// Validates a ratio or score in `[0, 1]`; NaN is rejected
    pub fn unit_interval(value: f64, field: &str) -> Result<(), ValidationError> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::with_value(field, "must be between 0 and 1", value))
        }
    }

    /// Validates that an existing path is a directory; a missing path passes
    pub fn directory_if_present(path: &Path, field: &str) -> Result<(), ValidationError> {
        if path.exists() && !path.is_dir() {
            Err(ValidationError::with_value(
                field,
                "path is not a directory",
                path.display(),
            ))
        } else {
            Ok(())
        }
    }

    /// Validates that a string is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    /// Collects multiple validation results into a single result
    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(|r| r.err()).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
