//! In-memory identity index over the managed library
//!
//! Built once per invocation by paging through a [`LibraryClient`]. Lookups
//! by identity are O(1); items without an identity are kept aside so path
//! lookups can still find them.

use crate::client::{LibraryClient, LibraryItem};
use crate::error::{LibraryError, LibraryResult};
use audioshelf_core::Identity;
use audioshelf_matching::{find_duplicates, PairScore};
use audioshelf_media_formats::QualityDescriptor;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Items requested per page
pub const PAGE_SIZE: usize = 100;

/// The library's copy of one identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryEntry {
    pub identity: Identity,
    pub title: String,
    pub author: Option<String>,
    pub path: PathBuf,
    pub quality: Option<QualityDescriptor>,
}

/// Two library items claiming the same identity; the first one listed wins
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityCollision {
    pub identity: Identity,
    pub kept: PathBuf,
    pub duplicate: PathBuf,
}

/// Library items judged to be the same book, with the evidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateSet {
    pub items: Vec<LibraryItem>,
    pub scores: Vec<PairScore>,
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_identity: HashMap<Identity, LibraryEntry>,
    untagged: Vec<LibraryItem>,
    collisions: Vec<IdentityCollision>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one listed item, recording a collision if its identity is taken
    pub fn insert(&mut self, item: LibraryItem) {
        let Some(identity) = item.identity.clone() else {
            self.untagged.push(item);
            return;
        };

        if let Some(kept) = self.by_identity.get(&identity) {
            log::warn!(
                "Identity {} appears twice in the library: keeping {}, ignoring {}",
                identity,
                kept.path.display(),
                item.path.display()
            );
            self.collisions.push(IdentityCollision {
                identity,
                kept: kept.path.clone(),
                duplicate: item.path,
            });
            return;
        }

        self.by_identity.insert(
            identity.clone(),
            LibraryEntry {
                identity,
                title: item.title,
                author: item.author,
                path: item.path,
                quality: item.quality,
            },
        );
    }

    pub fn exists(&self, identity: &Identity) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn get(&self, identity: &Identity) -> Option<&LibraryEntry> {
        self.by_identity.get(identity)
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.by_identity.values()
    }

    pub fn untagged(&self) -> &[LibraryItem] {
        &self.untagged
    }

    pub fn collisions(&self) -> &[IdentityCollision] {
        &self.collisions
    }

    /// Every indexed item, tagged or not, sorted by path
    pub fn items(&self) -> Vec<LibraryItem> {
        let mut items: Vec<LibraryItem> = self
            .by_identity
            .values()
            .map(|entry| LibraryItem {
                identity: Some(entry.identity.clone()),
                title: entry.title.clone(),
                author: entry.author.clone(),
                path: entry.path.clone(),
                quality: entry.quality.clone(),
            })
            .chain(self.untagged.iter().cloned())
            .collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }

    /// Groups library items that look like the same book
    ///
    /// Pair scores in each group index into that group's `items`.
    pub fn duplicate_sets(&self, threshold: f64) -> Vec<DuplicateSet> {
        let items = self.items();
        let pairs: Vec<(&str, Option<&str>)> = items
            .iter()
            .map(|item| (item.title.as_str(), item.author.as_deref()))
            .collect();

        find_duplicates(&pairs, threshold)
            .into_iter()
            .map(|group| {
                let position =
                    |index: usize| group.members.iter().position(|&m| m == index).unwrap_or(0);
                DuplicateSet {
                    items: group.members.iter().map(|&m| items[m].clone()).collect(),
                    scores: group
                        .scores
                        .iter()
                        .map(|pair| PairScore {
                            left: position(pair.left),
                            right: position(pair.right),
                            score: pair.score,
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// Finds the entry whose folder is `path` or contains it
    ///
    /// A folder that merely holds an entry (an author folder, say) or shares
    /// its final name never inherits that entry's identity.
    pub fn reverse_lookup(&self, path: &Path) -> Option<&LibraryEntry> {
        self.by_identity
            .values()
            .filter(|entry| path.starts_with(&entry.path))
            .max_by_key(|entry| entry.path.components().count())
    }
}

/// Pages through the whole library and indexes it
///
/// Any client error aborts the build: an unreachable library is never
/// mistaken for an empty one.
pub fn build_identity_index(
    client: &dyn LibraryClient,
    library_id: &str,
) -> LibraryResult<IdentityIndex> {
    let mut index = IdentityIndex::new();
    let mut offset = 0;

    loop {
        let page = client
            .list_page(library_id, offset, PAGE_SIZE)
            .map_err(|e| match e {
                LibraryError::Unavailable { .. } => e,
                other => LibraryError::Unavailable {
                    library: library_id.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let fetched = page.items.len();
        for item in page.items {
            index.insert(item);
        }
        offset += fetched;

        if fetched == 0 || offset >= page.total {
            break;
        }
    }

    log::info!(
        "Indexed {} identities in library '{}' ({} untagged, {} collisions)",
        index.len(),
        library_id,
        index.untagged.len(),
        index.collisions.len()
    );
    Ok(index)
}
