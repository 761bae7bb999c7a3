//! Metadata search over a local JSON catalog
//!
//! The catalog is an array of records:
//!
//! ```json
//! [{ "identity": "B000000001", "title": "Dune", "author": "Frank Herbert", "year": 1965 }]
//! ```

use crate::client::{BookMetadata, MetadataSearch, SearchCandidate};
use crate::error::{LibraryError, LibraryResult};
use audioshelf_core::Identity;
use audioshelf_matching::{compare, Blend};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Hits returned per search
const MAX_RESULTS: usize = 5;

pub struct CatalogSearch {
    records: Vec<BookMetadata>,
    by_identity: HashMap<Identity, usize>,
}

impl CatalogSearch {
    pub fn new(records: Vec<BookMetadata>) -> Self {
        let mut by_identity = HashMap::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            by_identity.entry(record.identity.clone()).or_insert(index);
        }
        Self {
            records,
            by_identity,
        }
    }

    pub fn from_file(path: &Path) -> LibraryResult<Self> {
        let catalog_err = |reason: String| LibraryError::Catalog {
            path: path.to_path_buf(),
            reason,
        };
        let contents = fs::read_to_string(path).map_err(|e| catalog_err(e.to_string()))?;
        let records: Vec<BookMetadata> =
            serde_json::from_str(&contents).map_err(|e| catalog_err(e.to_string()))?;
        log::info!("Loaded {} catalog records from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn confidence(record: &BookMetadata, title: &str, author: Option<&str>) -> f64 {
        let title_score = compare(title, &record.title).blended(Blend::BALANCED);
        match (author, record.author.as_deref()) {
            (Some(query), Some(known)) if !query.trim().is_empty() => {
                0.75 * title_score + 0.25 * compare(query, known).blended(Blend::BALANCED)
            }
            _ => title_score,
        }
    }
}

impl MetadataSearch for CatalogSearch {
    fn search(&self, title: &str, author: Option<&str>) -> LibraryResult<Vec<SearchCandidate>> {
        let mut hits: Vec<SearchCandidate> = self
            .records
            .iter()
            .map(|record| SearchCandidate {
                confidence: Self::confidence(record, title, author),
                metadata: record.clone(),
            })
            .filter(|hit| hit.confidence > 0.0)
            .collect();

        hits.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.metadata.identity.cmp(&b.metadata.identity))
        });
        hits.truncate(MAX_RESULTS);
        Ok(hits)
    }

    fn lookup(&self, identity: &Identity) -> LibraryResult<Option<BookMetadata>> {
        Ok(self
            .by_identity
            .get(identity)
            .map(|&index| self.records[index].clone()))
    }
}
