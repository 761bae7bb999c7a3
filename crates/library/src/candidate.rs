//! Discovery of candidate folders in a source directory

use crate::error::{LibraryError, LibraryResult};
use crate::naming::parse_folder_name;
use audioshelf_core::ParsedName;
use audioshelf_media_formats::QualityDescriptor;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One immediate subdirectory of the source directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFolder {
    /// Position in discovery order; results are reported in this order
    pub index: usize,
    pub path: PathBuf,
    pub name: String,
    pub parsed: ParsedName,
    /// Set when the caller already inspected the folder
    pub quality: Option<QualityDescriptor>,
}

impl CandidateFolder {
    pub fn new(index: usize, path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let parsed = parse_folder_name(&name);
        Self {
            index,
            path,
            name,
            parsed,
            quality: None,
        }
    }
}

/// Converts a shell glob (`*`, `?`) to an anchored regex
fn glob_to_regex(pattern: &str) -> LibraryResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| LibraryError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Lists the immediate subdirectories of `source_dir` matching `pattern`
///
/// Hidden folders are skipped. The result is sorted by name and indexed.
pub fn discover_candidates(source_dir: &Path, pattern: &str) -> LibraryResult<Vec<CandidateFolder>> {
    if !source_dir.is_dir() {
        return Err(LibraryError::DirectoryNotFound(source_dir.to_path_buf()));
    }
    if pattern.trim().is_empty() {
        return Err(LibraryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }
    let matcher = glob_to_regex(pattern)?;

    let mut paths: Vec<PathBuf> = fs::read_dir(source_dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            !name.starts_with('.') && matcher.is_match(&name)
        })
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    let candidates: Vec<CandidateFolder> = paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| CandidateFolder::new(index, path))
        .collect();

    log::info!(
        "Found {} candidate folders in {} matching '{}'",
        candidates.len(),
        source_dir.display(),
        pattern
    );
    Ok(candidates)
}
