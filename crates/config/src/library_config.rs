//! Managed library configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default canonical folder name
pub const DEFAULT_NAMING_TEMPLATE: &str = "{title} ({year}) ({author}) {ASIN.{identity}}";

/// The managed library and how its folders are named
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root of the managed library; required by commands that read it
    pub root: Option<PathBuf>,

    /// Identifier passed to the library client
    pub library_id: String,

    /// Destination for hardlink imports; defaults to `root`
    pub import_root: Option<PathBuf>,

    /// Where replaced releases are moved
    pub archive_dir: Option<PathBuf>,

    /// Canonical folder name template
    pub naming_template: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            library_id: "default".to_string(),
            import_root: None,
            archive_dir: None,
            naming_template: DEFAULT_NAMING_TEMPLATE.to_string(),
        }
    }
}

impl ConfigSection for LibraryConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::not_empty(&self.library_id, "library.library_id"),
            Validator::not_empty(&self.naming_template, "library.naming_template"),
        ];

        if !self.naming_template.contains("{title}") {
            results.push(Err(ValidationError::with_value(
                "library.naming_template",
                "must contain {title}",
                &self.naming_template,
            )));
        }

        for (field, path) in [
            ("library.root", &self.root),
            ("library.import_root", &self.import_root),
            ("library.archive_dir", &self.archive_dir),
        ] {
            if let Some(path) = path {
                results.push(Validator::directory_if_present(path, field));
            }
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        if other.root.is_some() {
            self.root = other.root;
        }
        if other.import_root.is_some() {
            self.import_root = other.import_root;
        }
        if other.archive_dir.is_some() {
            self.archive_dir = other.archive_dir;
        }
        self.library_id = other.library_id;
        self.naming_template = other.naming_template;
    }

    fn section_name(&self) -> &'static str {
        "library"
    }
}
