//! Pipeline over the filesystem-backed collaborators

use audioshelf_library::{
    run_reconciliation, BookMetadata, CatalogSearch, FileInspector, LocalLibrary, Outcome,
    ReconcileContext, ReconcileOptions, ResolutionSource, StagingMode,
};
use audioshelf_media_formats::TrumpOutcome;
use audioshelf_state::StateStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn book(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(&path).expect("mkdir");
    fs::write(path.join("01.mp3"), vec![0u8; 128]).expect("write");
    path
}

fn catalog() -> CatalogSearch {
    let record = |identity: &str, title: &str, author: &str, year: u16| BookMetadata {
        identity: identity.parse().expect("identity"),
        title: title.to_string(),
        author: Some(author.to_string()),
        series: None,
        volume: None,
        year: Some(year),
    };
    CatalogSearch::new(vec![
        record("B000000001", "Dune", "Frank Herbert", 1965),
        record("B000000002", "Project Hail Mary", "Andy Weir", 2021),
    ])
}

#[test]
fn test_import_into_local_library() {
    let temp = TempDir::new().expect("tempdir");
    let library_root = temp.path().join("library");
    let source = temp.path().join("incoming");
    let existing = book(&library_root, "Dune (1965) (Frank Herbert) {ASIN.B000000001}");
    let dune = book(&source, "Frank Herbert - Dune {ASIN.B000000001}");
    let phm = book(&source, "Project Hail Mary");

    let context = || {
        ReconcileContext::new(
            StateStore::new(temp.path().join("state.json")),
            Arc::new(LocalLibrary::new(&library_root)),
            Arc::new(FileInspector::new()),
            ReconcileOptions {
                search_enabled: true,
                mode: StagingMode::Import {
                    import_root: library_root.clone(),
                },
                ..ReconcileOptions::default()
            },
        )
        .with_search(Arc::new(catalog()))
    };

    let run = run_reconciliation(&context(), &source, "*").expect("run");
    assert_eq!(run.summary.imported, 2, "{:#?}", run.results);

    // Unreadable audio leaves durations unknown, so the copies are kept side by side
    let dune_result = &run.results[0];
    assert_eq!(dune_result.resolution, Some(ResolutionSource::FolderName));
    assert_eq!(
        dune_result.trump.as_ref().map(|d| d.outcome),
        Some(TrumpOutcome::KeepBoth)
    );
    assert!(library_root
        .join("Dune (1965) (Frank Herbert) {ASIN.B000000001} [MP3]")
        .join("01.mp3")
        .exists());

    let phm_result = &run.results[1];
    assert_eq!(phm_result.resolution, Some(ResolutionSource::Search));
    assert!(library_root
        .join("Project Hail Mary (2021) (Andy Weir) {ASIN.B000000002}")
        .exists());

    assert!(existing.exists());
    assert!(dune.exists());
    assert!(phm.exists());

    let again = run_reconciliation(&context(), &source, "*").expect("second run");
    assert_eq!(again.summary.mutations(), 0);
    assert!(again.results.iter().all(|r| r.outcome == Outcome::Skipped));
    assert_eq!(again.collisions.len(), 1);
}

#[test]
fn test_missing_library_root_is_fatal() {
    let temp = TempDir::new().expect("tempdir");
    let source = temp.path().join("incoming");
    book(&source, "Frank Herbert - Dune {ASIN.B000000001}");

    let ctx = ReconcileContext::new(
        StateStore::new(temp.path().join("state.json")),
        Arc::new(LocalLibrary::new(temp.path().join("no-such-library"))),
        Arc::new(FileInspector::new()),
        ReconcileOptions::default(),
    );

    let err = run_reconciliation(&ctx, &source, "*").expect_err("fatal");
    let app: audioshelf_core::AppError = err.into();
    assert!(app.is_fatal());
    assert!(source.join("Frank Herbert - Dune {ASIN.B000000001}").exists());
}
