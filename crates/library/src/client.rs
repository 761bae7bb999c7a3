//! Collaborator interfaces consumed by the reconciliation pipeline
//!
//! Implementations must be `Send + Sync`: one instance is shared by every
//! worker, and search calls run on a helper thread under a timeout.

use crate::error::LibraryResult;
use audioshelf_core::{Identity, ParsedName};
use audioshelf_media_formats::QualityDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One book as reported by a library client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    /// `None` for items that carry no identity tag
    pub identity: Option<Identity>,
    pub title: String,
    pub author: Option<String>,
    pub path: PathBuf,
    /// Filled when the client already knows the technical quality
    #[serde(default)]
    pub quality: Option<QualityDescriptor>,
}

/// One page of a paged listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: usize,
}

/// Canonical metadata for an identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub identity: Identity,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl BookMetadata {
    /// Metadata taken from the folder name itself
    pub fn from_parsed(identity: Identity, parsed: &ParsedName) -> Self {
        Self {
            identity,
            title: parsed.title.clone(),
            author: parsed.author.clone(),
            series: parsed.series.clone(),
            volume: parsed.volume.clone(),
            year: parsed.year,
        }
    }
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub metadata: BookMetadata,
    /// In `[0, 1]`
    pub confidence: f64,
}

/// Read access to the managed library
pub trait LibraryClient: Send + Sync {
    /// Returns items `offset..offset + limit` of the library, in a stable order
    fn list_page(&self, library_id: &str, offset: usize, limit: usize)
        -> LibraryResult<Page<LibraryItem>>;
}

/// Identity search by title and author
pub trait MetadataSearch: Send + Sync {
    /// Candidates ordered by descending confidence
    fn search(&self, title: &str, author: Option<&str>) -> LibraryResult<Vec<SearchCandidate>>;

    /// Canonical metadata for a known identity
    fn lookup(&self, identity: &Identity) -> LibraryResult<Option<BookMetadata>>;
}

/// Technical inspection of a book folder
pub trait QualityInspector: Send + Sync {
    /// Never fails: an unreadable folder yields [`QualityDescriptor::unknown`]
    fn inspect(&self, path: &Path) -> QualityDescriptor;

    /// Identity stored in the audio files' own tags, if any
    fn embedded_identity(&self, _path: &Path) -> Option<Identity> {
        None
    }
}
