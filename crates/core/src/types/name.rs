//! Components recovered from an audiobook folder name

use crate::types::Identity;
use serde::{Deserialize, Serialize};

/// Structured view of a folder name such as
/// `Book Title (2021) (Author Name) {ASIN.B000000001}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub title: String,
    pub author: Option<String>,
    pub series: Option<String>,
    pub volume: Option<String>,
    pub year: Option<u16>,
    /// Bracketed release tag such as `Audible` or `MP3`
    pub source_tag: Option<String>,
    /// Identity embedded in the name, if any
    pub identity: Option<Identity>,
}

impl ParsedName {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_series(mut self, series: impl Into<String>, volume: Option<String>) -> Self {
        self.series = Some(series.into());
        self.volume = volume;
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// True when the name carried an identity tag
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }
}
