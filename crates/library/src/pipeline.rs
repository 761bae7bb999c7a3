//! The reconciliation pipeline
//!
//! Each candidate folder moves through the same states:
//!
//! ```text
//! discovered -> identity known | unknown -> (search) -> resolved | UNRESOLVED
//!            -> safety check -> safe | FLAGGED
//!            -> conflict check -> DRY_RUN | RENAMED | IMPORTED | SKIPPED | FAILED
//! ```
//!
//! Candidates run on a bounded worker pool. Workers share the identity index
//! (read-only for the whole invocation) and the state store (lock-protected);
//! nothing else. A failing candidate becomes a `Failed` result and never
//! aborts the batch. Only the run lock, a corrupted state file and an
//! unreachable library stop the invocation, and they do so before any
//! candidate is touched.

use crate::candidate::{discover_candidates, CandidateFolder};
use crate::client::{BookMetadata, LibraryClient, MetadataSearch, QualityInspector};
use crate::error::{LibraryError, LibraryResult};
use crate::index::{build_identity_index, IdentityCollision, IdentityIndex, LibraryEntry};
use crate::naming::NamingTemplate;
use audioshelf_config::Config;
use audioshelf_core::{Identity, Timestamp};
use audioshelf_matching::{check_change, SafetyCheck, DEFAULT_SIMILARITY_THRESHOLD};
use audioshelf_media_formats::{QualityDescriptor, TrumpDecision, TrumpOutcome, TrumpPolicy};
use audioshelf_resilience::{with_timeout, CancellationToken, TaskOutcome, WorkerPool};
use audioshelf_state::{failed_key, ProcessedRecord, Stage, StateStore};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

/// Default search confidence floor
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Default worker count; the work is I/O bound, so this is not tied to cores
pub const DEFAULT_CONCURRENCY: usize = 8;

pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where an applied candidate ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingMode {
    /// Rename the folder inside its source directory
    RenameInPlace,
    /// Hardlink the folder tree into a separate managed root
    Import { import_root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    pub search_enabled: bool,
    pub confidence_threshold: f64,
    pub similarity_threshold: f64,
    /// Apply flagged candidates anyway
    pub force: bool,
    /// Skip the run lock
    pub force_lock: bool,
    pub concurrency: usize,
    pub search_timeout: Duration,
    pub trump_policy: TrumpPolicy,
    pub naming: NamingTemplate,
    pub mode: StagingMode,
    /// Destination for releases replaced by a better one
    pub archive_dir: Option<PathBuf>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            search_enabled: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            force: false,
            force_lock: false,
            concurrency: DEFAULT_CONCURRENCY,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            trump_policy: TrumpPolicy::default(),
            naming: NamingTemplate::new(audioshelf_config::DEFAULT_NAMING_TEMPLATE),
            mode: StagingMode::RenameInPlace,
            archive_dir: None,
        }
    }
}

impl ReconcileOptions {
    /// Options from the configuration file; run-specific toggles stay off
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_enabled: config.reconcile.search_enabled,
            confidence_threshold: config.reconcile.confidence_threshold,
            similarity_threshold: config.matching.similarity_threshold,
            concurrency: config.reconcile.concurrency,
            search_timeout: config.reconcile.search_timeout(),
            trump_policy: TrumpPolicy::new(
                config.reconcile.bitrate_noise_ratio,
                config.reconcile.duration_tolerance,
            ),
            naming: NamingTemplate::new(config.library.naming_template.clone()),
            archive_dir: config.library.archive_dir.clone(),
            ..Self::default()
        }
    }
}

/// Everything one invocation needs, built once by the caller
pub struct ReconcileContext {
    pub state: StateStore,
    pub library: Arc<dyn LibraryClient>,
    pub library_id: String,
    pub search: Option<Arc<dyn MetadataSearch>>,
    pub inspector: Arc<dyn QualityInspector>,
    pub cancel: CancellationToken,
    pub options: ReconcileOptions,
}

impl ReconcileContext {
    pub fn new(
        state: StateStore,
        library: Arc<dyn LibraryClient>,
        inspector: Arc<dyn QualityInspector>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            state,
            library,
            library_id: "default".to_string(),
            search: None,
            inspector,
            cancel: CancellationToken::new(),
            options,
        }
    }

    pub fn with_library_id(mut self, library_id: impl Into<String>) -> Self {
        self.library_id = library_id.into();
        self
    }

    pub fn with_search(mut self, search: Arc<dyn MetadataSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How a candidate's identity was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Tag embedded in the folder name
    FolderName,
    /// ASIN tag inside the audio files
    Tags,
    /// Folder already known to the library by path
    Library,
    /// External metadata search
    Search,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolderName => write!(f, "folder name"),
            Self::Tags => write!(f, "tags"),
            Self::Library => write!(f, "library"),
            Self::Search => write!(f, "search"),
        }
    }
}

/// Terminal state of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Renamed,
    Imported,
    DryRun,
    Skipped,
    Flagged,
    Unresolved,
    Failed,
    Cancelled,
}

impl Outcome {
    /// True when the filesystem was changed
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Renamed | Self::Imported)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Renamed => "renamed",
            Self::Imported => "imported",
            Self::DryRun => "dry-run",
            Self::Skipped => "skipped",
            Self::Flagged => "flagged",
            Self::Unresolved => "unresolved",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Full detail for one candidate, in discovery order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub index: usize,
    pub source_path: PathBuf,
    pub target_path: Option<PathBuf>,
    pub identity: Option<Identity>,
    pub resolution: Option<ResolutionSource>,
    pub confidence: Option<f64>,
    pub outcome: Outcome,
    pub trump: Option<TrumpDecision>,
    pub safety: Option<SafetyCheck>,
    pub detail: String,
}

impl CandidateResult {
    fn new(candidate: &CandidateFolder, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            index: candidate.index,
            source_path: candidate.path.clone(),
            target_path: None,
            identity: None,
            resolution: None,
            confidence: None,
            outcome,
            trump: None,
            safety: None,
            detail: detail.into(),
        }
    }

    fn finish(mut self, outcome: Outcome, detail: impl Into<String>) -> Self {
        self.outcome = outcome;
        self.detail = detail.into();
        self
    }
}

/// Outcome counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub total: usize,
    pub renamed: usize,
    pub imported: usize,
    pub dry_run: usize,
    pub skipped: usize,
    pub flagged: usize,
    pub unresolved: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl ReconcileSummary {
    pub fn from_results(results: &[CandidateResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.outcome {
                Outcome::Renamed => summary.renamed += 1,
                Outcome::Imported => summary.imported += 1,
                Outcome::DryRun => summary.dry_run += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Flagged => summary.flagged += 1,
                Outcome::Unresolved => summary.unresolved += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Renamed plus imported
    pub fn mutations(&self) -> usize {
        self.renamed + self.imported
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates: {} renamed, {} imported, {} dry-run, {} skipped, {} flagged, {} unresolved, {} failed",
            self.total,
            self.renamed,
            self.imported,
            self.dry_run,
            self.skipped,
            self.flagged,
            self.unresolved,
            self.failed
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct ReconcileRun {
    pub results: Vec<CandidateResult>,
    pub summary: ReconcileSummary,
    pub candidates: Vec<CandidateFolder>,
    pub collisions: Vec<IdentityCollision>,
}

struct Resolved {
    identity: Identity,
    source: ResolutionSource,
    confidence: f64,
    /// Metadata carried by the search hit, if any
    hit: Option<BookMetadata>,
}

/// Runs the pipeline over the subfolders of `source_dir` matching `pattern`
pub fn run_reconciliation(
    ctx: &ReconcileContext,
    source_dir: &Path,
    pattern: &str,
) -> LibraryResult<ReconcileRun> {
    let _run_lock = ctx.state.acquire_run_lock(ctx.options.force_lock)?;
    ctx.state.load()?;

    let candidates = discover_candidates(source_dir, pattern)?;
    let index = build_identity_index(ctx.library.as_ref(), &ctx.library_id)?;

    log::info!(
        "Reconciling {} candidates with {} workers{}",
        candidates.len(),
        ctx.options.concurrency,
        if ctx.options.dry_run { " (dry run)" } else { "" }
    );

    let pool = WorkerPool::new(ctx.options.concurrency)?;
    let outcomes = pool.run(&candidates, &ctx.cancel, |_, candidate| {
        process_candidate(ctx, &index, candidate)
    });

    let results: Vec<CandidateResult> = outcomes
        .into_iter()
        .zip(&candidates)
        .map(|(outcome, candidate)| match outcome {
            TaskOutcome::Completed(result) => result,
            TaskOutcome::Panicked(message) => {
                let detail = format!("worker panicked: {}", message);
                record_failure(ctx, candidate, None, &detail);
                CandidateResult::new(candidate, Outcome::Failed, detail)
            }
            TaskOutcome::NotStarted => CandidateResult::new(
                candidate,
                Outcome::Cancelled,
                "cancelled before start",
            ),
        })
        .collect();

    let summary = ReconcileSummary::from_results(&results);
    log::info!("{}", summary);

    Ok(ReconcileRun {
        results,
        summary,
        candidates,
        collisions: index.collisions().to_vec(),
    })
}

/// Runs one candidate end to end; errors become a `Failed` result
fn process_candidate(
    ctx: &ReconcileContext,
    index: &IdentityIndex,
    candidate: &CandidateFolder,
) -> CandidateResult {
    log::debug!("Candidate {}: {}", candidate.index, candidate.path.display());
    let mut result = CandidateResult::new(candidate, Outcome::Failed, String::new());

    match reconcile_candidate(ctx, index, candidate, &mut result) {
        Ok(()) => result,
        Err(e) => {
            let detail = e.to_string();
            log::warn!("{}: {}", candidate.path.display(), detail);
            record_failure(ctx, candidate, result.identity.as_ref(), &detail);
            result.finish(Outcome::Failed, detail)
        }
    }
}

fn record_failure(
    ctx: &ReconcileContext,
    candidate: &CandidateFolder,
    identity: Option<&Identity>,
    detail: &str,
) {
    if ctx.options.dry_run {
        return;
    }
    if let Err(e) = ctx.state.mark_failed(
        identity,
        &candidate.parsed.title,
        Some(&candidate.path),
        detail,
    ) {
        log::error!(
            "Could not record failure for {}: {}",
            candidate.path.display(),
            e
        );
    }
}

fn reconcile_candidate(
    ctx: &ReconcileContext,
    index: &IdentityIndex,
    candidate: &CandidateFolder,
    result: &mut CandidateResult,
) -> LibraryResult<()> {
    let resolved = match resolve_identity(ctx, index, candidate) {
        Ok(resolved) => resolved,
        Err(reason) => {
            log::debug!("{} unresolved: {}", candidate.path.display(), reason);
            record_failure(ctx, candidate, None, &reason);
            result.outcome = Outcome::Unresolved;
            result.detail = reason;
            return Ok(());
        }
    };
    result.identity = Some(resolved.identity.clone());
    result.resolution = Some(resolved.source);
    result.confidence = Some(resolved.confidence);
    let identity = resolved.identity.clone();

    if ctx.state.is_processed(&identity)? {
        result.outcome = Outcome::Skipped;
        result.detail = "already processed".to_string();
        return Ok(());
    }

    // The library's copy of this identity, when it lives somewhere else
    let library_copy = index.get(&identity);
    let conflicting = library_copy.filter(|entry| !same_folder(&entry.path, &candidate.path));
    let canonical = canonical_metadata(ctx, candidate, library_copy, resolved);

    let mut safety = check_against(ctx, candidate, &canonical.title, canonical.author.as_deref());
    if let Some(entry) = conflicting.filter(|entry| entry.title != canonical.title) {
        let against_library = check_against(ctx, candidate, &entry.title, entry.author.as_deref());
        if against_library.suspicious && !safety.suspicious {
            safety = against_library;
        }
    }
    let suspicious = safety.suspicious;
    let safety_reason = safety.reason.clone();
    result.safety = Some(safety);
    if suspicious {
        if !ctx.options.force {
            log::warn!(
                "Flagged {}: '{}' -> '{}' ({})",
                candidate.path.display(),
                candidate.parsed.title,
                canonical.title,
                safety_reason
            );
            result.outcome = Outcome::Flagged;
            result.detail = safety_reason;
            return Ok(());
        }
        log::warn!(
            "Applying flagged change for {} under --force: {}",
            candidate.path.display(),
            safety_reason
        );
    }

    let mut suffix = None;
    let mut replaced: Option<&LibraryEntry> = None;
    if let Some(entry) = conflicting {
        let existing = entry
            .quality
            .clone()
            .unwrap_or_else(|| ctx.inspector.inspect(&entry.path));
        let incoming = incoming_quality(ctx, candidate);
        let decision = ctx.options.trump_policy.decide(&existing, &incoming);
        log::debug!("Trump for {}: {}", identity, decision);

        let outcome = decision.outcome;
        let reason = decision.reason.clone();
        result.trump = Some(decision);
        match outcome {
            TrumpOutcome::KeepExisting | TrumpOutcome::RejectNew => {
                result.outcome = Outcome::Skipped;
                result.detail = format!("{}: {}", outcome, reason);
                return Ok(());
            }
            TrumpOutcome::KeepBoth => suffix = Some(format!(" [{}]", incoming.label())),
            TrumpOutcome::ReplaceWithNew if ctx.options.archive_dir.is_none() => {
                log::warn!(
                    "Not replacing {} with {}: no archive_dir configured",
                    entry.path.display(),
                    candidate.path.display()
                );
                result.outcome = Outcome::Flagged;
                result.detail = format!(
                    "{}: {}; configure an archive_dir to replace {}",
                    outcome,
                    reason,
                    entry.path.display()
                );
                return Ok(());
            }
            TrumpOutcome::ReplaceWithNew => replaced = Some(entry),
        }
    }

    let mut name = ctx.options.naming.render(&canonical);
    if let Some(suffix) = suffix {
        name.push_str(&suffix);
    }
    // A replacement lands where the library kept the release it replaces
    let target_dir = match (&ctx.options.mode, replaced) {
        (StagingMode::Import { import_root }, _) => import_root.clone(),
        (StagingMode::RenameInPlace, Some(entry)) => parent_dir(&entry.path),
        (StagingMode::RenameInPlace, None) => parent_dir(&candidate.path),
    };
    let target = target_dir.join(&name);
    result.target_path = Some(target.clone());

    let archive_from = replaced.and_then(|entry| {
        let dir = ctx.options.archive_dir.as_ref()?;
        Some((entry.path.clone(), archive_target(dir, &entry.path)))
    });
    let in_place = same_folder(&target, &candidate.path);

    if in_place && archive_from.is_none() {
        if !ctx.options.dry_run {
            record_processed(ctx, &identity, &canonical, &candidate.path, &target)?;
        }
        result.outcome = Outcome::Skipped;
        result.detail = "already canonical".to_string();
        return Ok(());
    }

    // Staged by an interrupted earlier run
    if archive_from.is_none()
        && target.exists()
        && ctx.state.should_skip_stage(&identity, Stage::Staged)?
    {
        if !ctx.options.dry_run {
            record_processed(ctx, &identity, &canonical, &candidate.path, &target)?;
        }
        result.outcome = Outcome::Skipped;
        result.detail = "staged by an earlier run".to_string();
        return Ok(());
    }

    let vacated = archive_from.as_ref().map(|(from, _)| from.as_path());
    if !in_place && target.exists() && vacated.is_none_or(|path| !same_folder(path, &target)) {
        return Err(LibraryError::staging(
            &candidate.path,
            &target,
            io::Error::new(io::ErrorKind::AlreadyExists, "target already exists"),
        ));
    }

    if ctx.options.dry_run {
        let verb = match ctx.options.mode {
            StagingMode::RenameInPlace => "would rename",
            StagingMode::Import { .. } => "would import",
        };
        result.outcome = Outcome::DryRun;
        result.detail = match &archive_from {
            Some((from, to)) => format!(
                "{} to {}, archiving {} to {}",
                verb,
                target.display(),
                from.display(),
                to.display()
            ),
            None => format!("{} to {}", verb, target.display()),
        };
        return Ok(());
    }

    if let Some((from, to)) = &archive_from {
        move_folder(from, to)?;
        log::info!("Archived {} -> {}", from.display(), to.display());
    }

    let staged = if in_place {
        Ok(())
    } else {
        match &ctx.options.mode {
            StagingMode::RenameInPlace => move_folder(&candidate.path, &target),
            StagingMode::Import { .. } => hardlink_tree(&candidate.path, &target),
        }
    };
    if let Err(e) = staged {
        // Put the replaced release back so the library keeps a copy
        if let Some((from, to)) = &archive_from {
            match move_folder(to, from) {
                Ok(()) => log::info!("Restored {} from the archive", from.display()),
                Err(restore) => log::error!(
                    "Could not restore {} from {}: {}",
                    from.display(),
                    to.display(),
                    restore
                ),
            }
        }
        return Err(e);
    }

    let outcome = match &ctx.options.mode {
        StagingMode::RenameInPlace => Outcome::Renamed,
        StagingMode::Import { .. } => Outcome::Imported,
    };
    log::info!("{} {} -> {}", outcome, candidate.path.display(), target.display());

    ctx.state
        .checkpoint_stage(&identity, Stage::Staged, Timestamp::now())?;
    record_processed(ctx, &identity, &canonical, &candidate.path, &target)?;

    result.outcome = outcome;
    result.detail = match &result.trump {
        Some(decision) => format!("{}: {}", decision.outcome, decision.reason),
        None => format!("{} to {}", outcome, target.display()),
    };
    Ok(())
}

/// Resolves the candidate's identity, or explains why it could not
fn resolve_identity(
    ctx: &ReconcileContext,
    index: &IdentityIndex,
    candidate: &CandidateFolder,
) -> Result<Resolved, String> {
    if let Some(identity) = &candidate.parsed.identity {
        return Ok(Resolved {
            identity: identity.clone(),
            source: ResolutionSource::FolderName,
            confidence: 1.0,
            hit: None,
        });
    }

    if let Some(identity) = ctx.inspector.embedded_identity(&candidate.path) {
        return Ok(Resolved {
            identity,
            source: ResolutionSource::Tags,
            confidence: 1.0,
            hit: None,
        });
    }

    if let Some(entry) = index.reverse_lookup(&candidate.path) {
        return Ok(Resolved {
            identity: entry.identity.clone(),
            source: ResolutionSource::Library,
            confidence: 1.0,
            hit: None,
        });
    }

    let search = match (&ctx.search, ctx.options.search_enabled) {
        (Some(search), true) => Arc::clone(search),
        _ => return Err("no identity in folder name or tags and search disabled".to_string()),
    };

    let title = candidate.parsed.title.clone();
    let author = candidate.parsed.author.clone();
    let hits = match with_timeout(ctx.options.search_timeout, move || {
        search.search(&title, author.as_deref())
    }) {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => return Err(format!("search failed: {}", e)),
        Err(e) => return Err(format!("search failed: {}", e)),
    };

    let Some(best) = hits
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    else {
        return Err("search returned no candidates".to_string());
    };

    if best.confidence < ctx.options.confidence_threshold {
        return Err(format!(
            "low confidence ({:.2} < {:.2}) for {}",
            best.confidence, ctx.options.confidence_threshold, best.metadata.identity
        ));
    }

    Ok(Resolved {
        identity: best.metadata.identity.clone(),
        source: ResolutionSource::Search,
        confidence: best.confidence,
        hit: Some(best.metadata),
    })
}

/// Canonical metadata: catalog lookup, then the library's copy, then the
/// search hit, then the folder name
///
/// The library's title and author override the hit or folder name; year
/// and series still come from those.
fn canonical_metadata(
    ctx: &ReconcileContext,
    candidate: &CandidateFolder,
    entry: Option<&LibraryEntry>,
    resolved: Resolved,
) -> BookMetadata {
    if let Some(search) = ctx.search.as_ref().filter(|_| ctx.options.search_enabled) {
        let search = Arc::clone(search);
        let identity = resolved.identity.clone();
        match with_timeout(ctx.options.search_timeout, move || search.lookup(&identity)) {
            Ok(Ok(Some(metadata))) => return metadata,
            Ok(Ok(None)) => {}
            Ok(Err(e)) => log::warn!("Lookup of {} failed: {}", resolved.identity, e),
            Err(e) => log::warn!("Lookup of {} failed: {}", resolved.identity, e),
        }
    }

    let fallback = resolved
        .hit
        .unwrap_or_else(|| BookMetadata::from_parsed(resolved.identity, &candidate.parsed));
    match entry {
        Some(entry) => BookMetadata {
            title: entry.title.clone(),
            author: entry.author.clone().or(fallback.author.clone()),
            ..fallback
        },
        None => fallback,
    }
}

/// Title/author check of the candidate against `title` and `author`
fn check_against(
    ctx: &ReconcileContext,
    candidate: &CandidateFolder,
    title: &str,
    author: Option<&str>,
) -> SafetyCheck {
    check_change(
        &candidate.parsed.title,
        title,
        candidate.parsed.author.as_deref(),
        author,
        ctx.options.similarity_threshold,
    )
}

fn incoming_quality(ctx: &ReconcileContext, candidate: &CandidateFolder) -> QualityDescriptor {
    candidate
        .quality
        .clone()
        .unwrap_or_else(|| ctx.inspector.inspect(&candidate.path))
}

fn record_processed(
    ctx: &ReconcileContext,
    identity: &Identity,
    canonical: &BookMetadata,
    source: &Path,
    target: &Path,
) -> LibraryResult<()> {
    let record = ProcessedRecord::new(canonical.title.clone())
        .with_author(canonical.author.clone())
        .with_series(canonical.series.clone())
        .with_staging_path(target);
    ctx.state.mark_processed(identity, record)?;

    // An earlier run may have left this folder unresolved under its path key
    let stale = failed_key(None, Some(source));
    if ctx.state.load()?.failed.contains_key(&stale) {
        ctx.state.clear(&stale)?;
    }
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn same_folder(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Destination inside `archive_dir`, made unique with a timestamp if needed
fn archive_target(archive_dir: &Path, existing: &Path) -> PathBuf {
    let name = existing
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archived".to_string());
    let target = archive_dir.join(&name);
    if target.exists() {
        archive_dir.join(format!("{}.{}", name, Timestamp::now().file_stamp()))
    } else {
        target
    }
}

fn move_folder(from: &Path, to: &Path) -> LibraryResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| LibraryError::staging(from, to, e))?;
    }
    fs::rename(from, to).map_err(|e| LibraryError::staging(from, to, e))
}

/// Recreates `from` under `to` with hardlinked files
///
/// A partially built tree is removed on failure; `from` is never modified.
fn hardlink_tree(from: &Path, to: &Path) -> LibraryResult<()> {
    let link_all = || -> io::Result<()> {
        fs::create_dir_all(to)?;
        for entry in WalkDir::new(from).min_depth(1) {
            let entry = entry.map_err(io::Error::other)?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .map_err(io::Error::other)?;
            let destination = to.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)?;
            } else {
                fs::hard_link(entry.path(), &destination)?;
            }
        }
        Ok(())
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| LibraryError::staging(from, to, e))?;
    }
    link_all().map_err(|e| {
        if let Err(cleanup) = fs::remove_dir_all(to) {
            log::warn!("Could not remove partial import {}: {}", to.display(), cleanup);
        }
        LibraryError::staging(from, to, e)
    })
}
