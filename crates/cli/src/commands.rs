use anyhow::{anyhow, bail, Context, Result};
use audioshelf_config::Config;
use audioshelf_core::AppError;
use audioshelf_library::{
    build_identity_index, run_reconciliation, CandidateResult, CatalogSearch, DuplicateSet,
    ExporterRegistry, FileInspector, IdentityCollision, LocalLibrary, Outcome, ReconcileContext,
    ReconcileOptions, ReconcileReport, ReconcileRun, StagingMode,
};
use audioshelf_resilience::CancellationToken;
use audioshelf_state::StateStore;
use clap::ArgMatches;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

/// Resolve, check and apply every candidate folder under SOURCE
pub async fn reconcile(mut config: Config, matches: &ArgMatches) -> Result<()> {
    apply_reconcile_flags(&mut config, matches);
    validate(&config)?;

    let source = matches
        .get_one::<PathBuf>("source")
        .cloned()
        .ok_or_else(|| anyhow!("Source directory is required"))?;
    let pattern = matches
        .get_one::<String>("pattern")
        .cloned()
        .unwrap_or_else(|| "*".to_string());
    let root = library_root(&config)?;

    let mut options = ReconcileOptions::from_config(&config);
    options.dry_run = matches.get_flag("dry-run");
    options.force = matches.get_flag("force");
    options.force_lock = matches.get_flag("force-lock");
    if matches.get_flag("import") {
        options.mode = StagingMode::Import {
            import_root: config
                .library
                .import_root
                .clone()
                .unwrap_or_else(|| root.clone()),
        };
    }
    let dry_run = options.dry_run;

    let cancel = CancellationToken::new();
    let mut ctx = ReconcileContext::new(
        state_store(&config),
        Arc::new(LocalLibrary::new(root)),
        Arc::new(FileInspector::new()),
        options,
    )
    .with_library_id(config.library.library_id.clone())
    .with_cancellation(cancel.clone());

    if let Some(catalog_path) = &config.reconcile.catalog_path {
        let catalog = CatalogSearch::from_file(catalog_path).map_err(AppError::from)?;
        log::info!(
            "Loaded {} catalog records from {}",
            catalog.len(),
            catalog_path.display()
        );
        ctx = ctx.with_search(Arc::new(catalog));
    }

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; finishing candidates already in flight");
            cancel.cancel();
        }
    });

    let run_source = source.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        run_reconciliation(&ctx, &run_source, &pattern)
    })
    .await;
    interrupt.abort();

    let run = outcome
        .context("Reconciliation worker stopped unexpectedly")?
        .map_err(AppError::from)?;

    print_run(&run, dry_run);

    if let Some(report_path) = matches.get_one::<PathBuf>("report") {
        let format = matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("json");
        let report = ReconcileReport::new(&run, &source, dry_run);
        ExporterRegistry::with_defaults()
            .export(format, &report, report_path)
            .map_err(AppError::from)
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
        println!(
            "{} Report written to {}",
            style("✓").green().bold(),
            report_path.display()
        );
    }

    Ok(())
}

/// Show counts from the state file
pub fn show_status(config: &Config) -> Result<()> {
    let store = state_store(config);
    let summary = store.status().map_err(AppError::from)?;
    let retryable = store
        .failed_for_retry(config.state.max_retries)
        .map_err(AppError::from)?
        .len();

    println!("\n{}", style("Reconciliation State").bold().cyan());
    println!("{}", "=".repeat(60));
    println!("State file:   {}", store.path().display());
    println!("Version:      {}", summary.version);
    println!("Processed:    {}", style(summary.processed).green());
    println!("In progress:  {}", style(summary.in_progress).yellow());
    println!(
        "Failed:       {} ({} retryable)",
        style(summary.failed).red(),
        retryable
    );
    println!();

    Ok(())
}

/// List processed identities, or failures with `failed`
pub fn list_state(config: &Config, failed: bool) -> Result<()> {
    let document = state_store(config).load().map_err(AppError::from)?;

    if failed {
        if document.failed.is_empty() {
            println!("No recorded failures.");
            return Ok(());
        }
        println!("\n{} Failures", style(document.failed.len()).bold().red());
        println!("{}", "=".repeat(80));
        for (key, record) in &document.failed {
            println!(
                "{}  {} (retries: {})",
                style(key).bold(),
                record.title,
                record.retry_count
            );
            if let Some(path) = &record.path {
                println!("    Path:  {}", path.display());
            }
            println!("    Error: {}", style(&record.error).dim());
        }
        return Ok(());
    }

    if document.processed.is_empty() {
        println!("Nothing processed yet. Use 'reconcile' to process a source directory.");
        return Ok(());
    }

    println!(
        "\n{} Processed identities",
        style(document.processed.len()).bold().cyan()
    );
    println!("{}", "=".repeat(80));
    for (identity, record) in &document.processed {
        let author = record.author.as_deref().unwrap_or("Unknown Author");
        let marker = if record.is_complete() {
            style("✓").green()
        } else {
            style("…").yellow()
        };
        println!(
            "{} {}  {} by {}",
            marker,
            style(identity).bold(),
            record.title,
            author
        );
        if let Some(path) = &record.staging_path {
            println!("    {}", style(path.display()).dim());
        }
    }

    Ok(())
}

/// Forget one identity so the next run processes it again
pub fn clear_identity(config: &Config, key: &str) -> Result<()> {
    let removed = state_store(config).clear(key).map_err(AppError::from)?;
    if !removed {
        bail!("No state recorded for '{}'", key);
    }
    println!("{} Cleared {}", style("✓").green().bold(), key);
    Ok(())
}

/// Back up and empty the state file; refuses without confirmation
pub fn reset_state(config: &Config, confirmed: bool) -> Result<()> {
    let store = state_store(config);
    if !confirmed {
        bail!(
            "Refusing to reset {} without --yes",
            store.path().display()
        );
    }

    match store.reset().map_err(AppError::from)? {
        Some(backup) => println!(
            "{} State reset; previous file saved as {}",
            style("✓").green().bold(),
            backup.display()
        ),
        None => println!("{} State reset", style("✓").green().bold()),
    }
    Ok(())
}

/// Print groups of library entries that look like the same book
pub fn show_duplicates(mut config: Config, matches: &ArgMatches) -> Result<()> {
    if let Some(&threshold) = matches.get_one::<f64>("threshold") {
        config.matching.duplicate_threshold = threshold;
    }
    validate(&config)?;

    let (sets, collisions) = find_library_duplicates(&config)?;

    if sets.is_empty() {
        println!("No duplicates found.");
    }
    for (number, set) in sets.iter().enumerate() {
        println!(
            "\n{} {} ({} entries)",
            style("Group").bold().cyan(),
            number + 1,
            set.items.len()
        );
        for (position, item) in set.items.iter().enumerate() {
            let identity = item
                .identity
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "untagged".to_string());
            println!("  [{}] {} ({})", position, item.path.display(), identity);
        }
        for pair in &set.scores {
            println!(
                "      [{}] ~ [{}]  {}",
                pair.left,
                pair.right,
                style(format_score(pair.score)).yellow()
            );
        }
    }

    if !collisions.is_empty() {
        println!("\n{}", style("Identity collisions").bold().red());
        for collision in &collisions {
            println!("  {}", describe_collision(collision));
        }
    }

    Ok(())
}

/// Prints the error chain, then what the operator should do about it
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", style("error:").red().bold(), err);
    if let Some(app) = err.downcast_ref::<AppError>() {
        eprintln!("{} {}", style("hint:").yellow().bold(), app.remediation());
    }
}

fn apply_reconcile_flags(config: &mut Config, matches: &ArgMatches) {
    if matches.get_flag("search") {
        config.reconcile.search_enabled = true;
    }
    if let Some(catalog) = matches.get_one::<PathBuf>("catalog") {
        config.reconcile.catalog_path = Some(catalog.clone());
    }
    if let Some(&confidence) = matches.get_one::<f64>("confidence") {
        config.reconcile.confidence_threshold = confidence;
    }
    if let Some(&similarity) = matches.get_one::<f64>("similarity") {
        config.matching.similarity_threshold = similarity;
    }
    if let Some(&jobs) = matches.get_one::<usize>("jobs") {
        config.reconcile.concurrency = jobs;
    }
}

/// Invalid settings stop the command before anything is read or written
fn validate(config: &Config) -> Result<(), AppError> {
    config.validate().map_err(|errors| AppError::Configuration {
        setting: errors
            .first()
            .map(|e| e.field.clone())
            .unwrap_or_else(|| "config".to_string()),
        reason: errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "),
    })
}

fn library_root(config: &Config) -> Result<PathBuf, AppError> {
    config
        .library
        .root
        .clone()
        .ok_or_else(|| AppError::Configuration {
            setting: "library.root".to_string(),
            reason: "no managed library configured; pass --library or set library.root"
                .to_string(),
        })
}

fn state_store(config: &Config) -> StateStore {
    StateStore::new(config.state.path.clone())
}

fn find_library_duplicates(
    config: &Config,
) -> Result<(Vec<DuplicateSet>, Vec<IdentityCollision>)> {
    let library = LocalLibrary::new(library_root(config)?);
    let index = build_identity_index(&library, &config.library.library_id)
        .map_err(AppError::from)?;
    Ok((
        index.duplicate_sets(config.matching.duplicate_threshold),
        index.collisions().to_vec(),
    ))
}

fn print_run(run: &ReconcileRun, dry_run: bool) {
    if run.results.is_empty() {
        println!("No candidate folders matched.");
        return;
    }

    let heading = if dry_run { "Dry run" } else { "Reconciliation" };
    println!("\n{} ({} candidates)", style(heading).bold().cyan(), run.summary.total);
    println!("{}", "=".repeat(80));

    for result in &run.results {
        let label = format!("{:<10}", result.outcome.to_string());
        let label = match result.outcome {
            Outcome::Renamed | Outcome::Imported => style(label).green(),
            Outcome::DryRun => style(label).cyan(),
            Outcome::Flagged | Outcome::Unresolved => style(label).yellow(),
            Outcome::Failed => style(label).red(),
            Outcome::Skipped | Outcome::Cancelled => style(label).dim(),
        };
        println!("{} {}", label, describe_result(result));
    }

    for collision in &run.collisions {
        println!("{} {}", style("warning:").yellow(), describe_collision(collision));
    }

    println!("{}", "=".repeat(80));
    println!("{}", run.summary);
}

fn describe_result(result: &CandidateResult) -> String {
    let name = result
        .source_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| result.source_path.display().to_string());

    let mut line = match &result.target_path {
        Some(target) if result.outcome.is_mutation() || result.outcome == Outcome::DryRun => {
            format!("{} -> {}", name, target.display())
        }
        _ => name,
    };

    if let Some(confidence) = result.confidence {
        line.push_str(&format!(" [{}]", format_score(confidence)));
    }
    if !result.detail.is_empty() && !result.outcome.is_mutation() {
        line.push_str(&format!(": {}", result.detail));
    }
    line
}

fn describe_collision(collision: &IdentityCollision) -> String {
    format!(
        "{} is claimed by {} and {}",
        collision.identity,
        collision.kept.display(),
        collision.duplicate.display()
    )
}

fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

#[cfg(test)]
mod tests;
