//! Library client over a managed directory tree

use crate::client::{LibraryClient, LibraryItem, Page};
use crate::error::{LibraryError, LibraryResult};
use crate::naming::parse_folder_name;
use audioshelf_media_formats::AudioFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

/// Treats every book folder under `root` as one library item
///
/// Two layouts are recognised: `root/<book>/` and `root/<author>/<book>/`.
/// A folder whose audio sits only in subfolders (`CD1`, `CD2`) is one book.
/// The listing is taken when page zero is requested and reused for later
/// pages, so a paged walk sees a consistent snapshot.
pub struct LocalLibrary {
    root: PathBuf,
    snapshot: Mutex<Option<Arc<Vec<LibraryItem>>>>,
}

impl LocalLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unavailable(&self, library_id: &str, reason: impl Into<String>) -> LibraryError {
        LibraryError::Unavailable {
            library: library_id.to_string(),
            reason: reason.into(),
        }
    }

    fn scan(&self, library_id: &str) -> LibraryResult<Vec<LibraryItem>> {
        if !self.root.is_dir() {
            return Err(self.unavailable(
                library_id,
                format!("{} is not a readable directory", self.root.display()),
            ));
        }

        let mut items = Vec::new();
        for dir in subdirectories(&self.root)
            .map_err(|e| self.unavailable(library_id, e.to_string()))?
        {
            if has_audio_directly(&dir) {
                items.push(item_for(&dir, None));
                continue;
            }

            let books: Vec<PathBuf> = subdirectories(&dir)
                .unwrap_or_default()
                .into_iter()
                .filter(|child| has_audio_directly(child))
                .collect();

            if !books.is_empty() {
                let author = dir.file_name().map(|n| n.to_string_lossy().to_string());
                items.extend(books.iter().map(|book| item_for(book, author.clone())));
            } else if has_audio_recursive(&dir) {
                items.push(item_for(&dir, None));
            }
        }

        items.sort_by(|a, b| a.path.cmp(&b.path));
        log::debug!("Library {} lists {} items", self.root.display(), items.len());
        Ok(items)
    }
}

impl LibraryClient for LocalLibrary {
    fn list_page(
        &self,
        library_id: &str,
        offset: usize,
        limit: usize,
    ) -> LibraryResult<Page<LibraryItem>> {
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|_| self.unavailable(library_id, "library snapshot lock poisoned"))?;

        let items = match snapshot.as_ref() {
            Some(items) if offset > 0 => Arc::clone(items),
            _ => {
                let items = Arc::new(self.scan(library_id)?);
                *snapshot = Some(Arc::clone(&items));
                items
            }
        };

        Ok(Page {
            items: items.iter().skip(offset).take(limit).cloned().collect(),
            total: items.len(),
        })
    }
}

fn subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

pub(crate) fn is_audio_file(path: &Path) -> bool {
    path.is_file() && AudioFormat::from_path(path).is_some()
}

fn has_audio_directly(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|entry| is_audio_file(&entry.path()))
        })
        .unwrap_or(false)
}

fn has_audio_recursive(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .any(|entry| is_audio_file(entry.path()))
}

fn item_for(dir: &Path, parent_author: Option<String>) -> LibraryItem {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parsed = parse_folder_name(&name);
    LibraryItem {
        identity: parsed.identity,
        title: parsed.title,
        author: parsed.author.or(parent_author),
        path: dir.to_path_buf(),
        quality: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn book(root: &Path, rel: &str, file: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join(file), b"audio").expect("write");
    }

    #[test]
    fn test_lists_both_layouts() {
        let temp = TempDir::new().expect("tempdir");
        book(temp.path(), "Dune (1965) (Frank Herbert) {ASIN.B000000001}", "01.mp3");
        book(temp.path(), "Andy Weir/Project Hail Mary", "book.m4b");
        book(temp.path(), "Big Box Set/CD1", "track.flac");
        fs::create_dir_all(temp.path().join("empty")).expect("mkdir");

        let library = LocalLibrary::new(temp.path());
        let page = library.list_page("default", 0, 100).expect("list");

        assert_eq!(page.total, 3);
        let phm = page
            .items
            .iter()
            .find(|item| item.title == "Project Hail Mary")
            .expect("author layout");
        assert_eq!(phm.author.as_deref(), Some("Andy Weir"));

        let dune = page.items.iter().find(|item| item.title == "Dune").expect("dune");
        assert_eq!(dune.identity.as_ref().map(|i| i.as_str()), Some("B000000001"));

        assert!(page.items.iter().any(|item| item.title == "Big Box Set"));
    }

    #[test]
    fn test_paging() {
        let temp = TempDir::new().expect("tempdir");
        for i in 0..5 {
            book(temp.path(), &format!("Book {}", i), "a.mp3");
        }
        let library = LocalLibrary::new(temp.path());
        let first = library.list_page("default", 0, 2).expect("page");
        let last = library.list_page("default", 4, 2).expect("page");
        assert_eq!(first.items.len(), 2);
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.total, 5);
    }

    #[test]
    fn test_missing_root_is_unavailable() {
        let library = LocalLibrary::new("/nonexistent/audioshelf/library");
        let err = library.list_page("main", 0, 10).expect_err("missing root");
        assert!(matches!(err, LibraryError::Unavailable { .. }));
    }
}
