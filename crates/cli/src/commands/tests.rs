use super::*;
use audioshelf_library::ReconcileSummary;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn book(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("01.mp3"), vec![0u8; 64]).unwrap();
    path
}

fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.state.path = temp.path().join("state.json");
    let library = temp.path().join("library");
    fs::create_dir_all(&library).unwrap();
    config.library.root = Some(library);
    config
}

fn sub_matches(args: &[&str]) -> ArgMatches {
    let matches = crate::build_cli()
        .try_get_matches_from(std::iter::once("audioshelf").chain(args.iter().copied()))
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

fn result(outcome: Outcome, target: Option<&str>, detail: &str) -> CandidateResult {
    CandidateResult {
        index: 0,
        source_path: PathBuf::from("/in/Project Hail Mary"),
        target_path: target.map(PathBuf::from),
        identity: None,
        resolution: None,
        confidence: None,
        outcome,
        trump: None,
        safety: None,
        detail: detail.to_string(),
    }
}

#[test]
fn test_describe_renamed_shows_target() {
    let mut renamed = result(
        Outcome::Renamed,
        Some("/in/Project Hail Mary (2021) (Andy Weir) {ASIN.B000000002}"),
        "",
    );
    renamed.confidence = Some(0.923);

    assert_eq!(
        describe_result(&renamed),
        "Project Hail Mary -> /in/Project Hail Mary (2021) (Andy Weir) {ASIN.B000000002} [0.92]"
    );
}

#[test]
fn test_describe_skipped_shows_reason() {
    let skipped = result(Outcome::Skipped, Some("/in/ignored"), "already processed");
    assert_eq!(describe_result(&skipped), "Project Hail Mary: already processed");
}

#[test]
fn test_format_score() {
    assert_eq!(format_score(1.0), "1.00");
    assert_eq!(format_score(0.876), "0.88");
}

#[test]
fn test_reconcile_flags_override_config() {
    let matches = sub_matches(&[
        "reconcile",
        "/in",
        "--search",
        "--catalog",
        "/tmp/catalog.json",
        "--confidence",
        "0.9",
        "--similarity",
        "0.5",
        "--jobs",
        "2",
    ]);
    let mut config = Config::default();
    apply_reconcile_flags(&mut config, &matches);

    assert!(config.reconcile.search_enabled);
    assert_eq!(
        config.reconcile.catalog_path,
        Some(PathBuf::from("/tmp/catalog.json"))
    );
    assert_eq!(config.reconcile.confidence_threshold, 0.9);
    assert_eq!(config.matching.similarity_threshold, 0.5);
    assert_eq!(config.reconcile.concurrency, 2);
}

#[test]
fn test_validate_names_the_bad_setting() {
    let mut config = Config::default();
    config.reconcile.concurrency = 0;

    match validate(&config) {
        Err(AppError::Configuration { setting, .. }) => {
            assert_eq!(setting, "reconcile.concurrency")
        }
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_search_without_catalog_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    let matches = sub_matches(&["reconcile", "/in", "--search"]);
    apply_reconcile_flags(&mut config, &matches);

    assert!(matches!(
        validate(&config),
        Err(AppError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_reconcile_without_library_is_fatal() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&temp);
    config.library.root = None;
    let source = temp.path().join("incoming");
    book(&source, "Frank Herbert - Dune {ASIN.B000000001}");

    let matches = sub_matches(&["reconcile", source.to_str().unwrap()]);
    let err = reconcile(config, &matches).await.unwrap_err();

    let app = err.downcast_ref::<AppError>().unwrap();
    assert!(app.is_fatal());
    assert!(app.remediation().contains("library.root"));
}

#[tokio::test]
async fn test_reconcile_dry_run_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let source = temp.path().join("incoming");
    let dune = book(&source, "Frank Herbert - Dune {ASIN.B000000001}");

    let matches = sub_matches(&["reconcile", source.to_str().unwrap(), "--dry-run"]);
    reconcile(config.clone(), &matches).await.unwrap();

    assert!(dune.exists());
    assert!(!source.join("Dune (Frank Herbert) {ASIN.B000000001}").exists());
    assert_eq!(state_store(&config).status().unwrap().processed, 0);
}

#[tokio::test]
async fn test_reconcile_renames_and_writes_report() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let source = temp.path().join("incoming");
    book(&source, "Frank Herbert - Dune {ASIN.B000000001}");
    let report = temp.path().join("report.json");

    let matches = sub_matches(&[
        "reconcile",
        source.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
    ]);
    reconcile(config.clone(), &matches).await.unwrap();

    assert!(source
        .join("Dune (Frank Herbert) {ASIN.B000000001}")
        .join("01.mp3")
        .exists());
    assert_eq!(state_store(&config).status().unwrap().processed, 1);

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.contains("\"renamed\": 1"));
}

#[test]
fn test_clear_unknown_identity_fails() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    assert!(clear_identity(&config, "B000000009").is_err());
}

#[test]
fn test_reset_requires_confirmation() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    fs::write(&config.state.path, "not json").unwrap();

    assert!(reset_state(&config, false).is_err());
    assert_eq!(fs::read_to_string(&config.state.path).unwrap(), "not json");

    reset_state(&config, true).unwrap();
    assert_eq!(state_store(&config).status().unwrap().processed, 0);
}

#[test]
fn test_list_and_status_on_empty_state() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    show_status(&config).unwrap();
    list_state(&config, false).unwrap();
    list_state(&config, true).unwrap();
}

#[test]
fn test_duplicates_in_local_library() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let root = config.library.root.clone().unwrap();
    book(&root.join("Andy Weir"), "Project Hail Mary");
    book(&root.join("Andy Weir"), "Project Hail Mary [MP3]");
    book(&root.join("Andy Weir"), "The Martian");

    let (sets, collisions) = find_library_duplicates(&config).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].items.len(), 2);
    assert!(collisions.is_empty());

    let matches = sub_matches(&["duplicates", "--threshold", "0.95"]);
    show_duplicates(config, &matches).unwrap();
}

#[test]
fn test_summary_counts_line_up_with_outcomes() {
    let results = vec![
        result(Outcome::Renamed, None, ""),
        result(Outcome::Failed, None, "boom"),
    ];
    let summary = ReconcileSummary::from_results(&results);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.mutations(), 1);
}
