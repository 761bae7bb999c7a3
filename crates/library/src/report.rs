//! Run reports and their exporters

use crate::error::{LibraryError, LibraryResult};
use crate::index::IdentityCollision;
use crate::pipeline::{CandidateResult, ReconcileRun, ReconcileSummary};
use audioshelf_core::Timestamp;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Machine-readable record of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub generated_at: Timestamp,
    pub source_dir: PathBuf,
    pub dry_run: bool,
    pub summary: ReconcileSummary,
    pub results: Vec<CandidateResult>,
    pub collisions: Vec<IdentityCollision>,
}

impl ReconcileReport {
    pub fn new(run: &ReconcileRun, source_dir: &Path, dry_run: bool) -> Self {
        Self {
            generated_at: Timestamp::now(),
            source_dir: source_dir.to_path_buf(),
            dry_run,
            summary: run.summary,
            results: run.results.clone(),
            collisions: run.collisions.clone(),
        }
    }
}

/// Renders a report in one output format
pub trait ReportExporter: Send + Sync {
    /// Registry key, e.g. `json`
    fn name(&self) -> &'static str;

    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn render(&self, report: &ReconcileReport) -> LibraryResult<String>;
}

pub struct JsonExporter;

impl ReportExporter for JsonExporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &ReconcileReport) -> LibraryResult<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

pub struct MarkdownExporter;

impl MarkdownExporter {
    fn cell(value: &str) -> String {
        value.replace('|', "\\|")
    }
}

impl ReportExporter for MarkdownExporter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, report: &ReconcileReport) -> LibraryResult<String> {
        let mut out = String::new();
        let s = &report.summary;
        // Writing to a String cannot fail
        let _ = writeln!(out, "# Reconciliation report");
        let _ = writeln!(out);
        let _ = writeln!(out, "- Source: `{}`", report.source_dir.display());
        let _ = writeln!(out, "- Generated: {}", report.generated_at);
        let _ = writeln!(out, "- Dry run: {}", if report.dry_run { "yes" } else { "no" });
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "| Total | Renamed | Imported | Dry run | Skipped | Flagged | Unresolved | Failed | Cancelled |"
        );
        let _ = writeln!(out, "|---|---|---|---|---|---|---|---|---|");
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            s.total,
            s.renamed,
            s.imported,
            s.dry_run,
            s.skipped,
            s.flagged,
            s.unresolved,
            s.failed,
            s.cancelled
        );

        let _ = writeln!(out);
        let _ = writeln!(out, "## Candidates");
        let _ = writeln!(out);
        let _ = writeln!(out, "| # | Source | Target | Identity | Resolved by | Confidence | Outcome | Detail |");
        let _ = writeln!(out, "|---|---|---|---|---|---|---|---|");
        for result in &report.results {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} |",
                result.index,
                Self::cell(&result.source_path.display().to_string()),
                Self::cell(
                    &result
                        .target_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
                result
                    .identity
                    .as_ref()
                    .map(|i| i.to_string())
                    .unwrap_or_default(),
                result.resolution.map(|r| r.to_string()).unwrap_or_default(),
                result
                    .confidence
                    .map(|c| format!("{:.2}", c))
                    .unwrap_or_default(),
                result.outcome,
                Self::cell(&result.detail),
            );
        }

        if !report.collisions.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Identity collisions in the library");
            let _ = writeln!(out);
            for collision in &report.collisions {
                let _ = writeln!(
                    out,
                    "- {}: kept `{}`, ignored `{}`",
                    collision.identity,
                    collision.kept.display(),
                    collision.duplicate.display()
                );
            }
        }

        Ok(out)
    }
}

/// Exporters keyed by format name
///
/// Built explicitly by the caller; nothing registers itself.
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: BTreeMap<&'static str, Box<dyn ReportExporter>>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the JSON and Markdown exporters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(JsonExporter));
        registry.register(Box::new(MarkdownExporter));
        registry
    }

    /// Adds an exporter, replacing any with the same name
    pub fn register(&mut self, exporter: Box<dyn ReportExporter>) {
        self.exporters.insert(exporter.name(), exporter);
    }

    pub fn get(&self, format: &str) -> LibraryResult<&dyn ReportExporter> {
        self.exporters
            .get(format.to_ascii_lowercase().as_str())
            .map(|exporter| exporter.as_ref())
            .ok_or_else(|| LibraryError::UnknownFormat(format.to_string()))
    }

    pub fn formats(&self) -> Vec<&'static str> {
        self.exporters.keys().copied().collect()
    }

    /// Renders `report` in `format` and writes it to `path`
    pub fn export(&self, format: &str, report: &ReconcileReport, path: &Path) -> LibraryResult<()> {
        let rendered = self.get(format)?.render(report)?;
        fs::write(path, rendered)?;
        log::info!("Wrote {} report to {}", format, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateFolder;
    use crate::pipeline::{Outcome, ResolutionSource};
    use tempfile::TempDir;

    fn report() -> ReconcileReport {
        let candidate = CandidateFolder::new(0, PathBuf::from("/in/Project Hail Mary"));
        let result = CandidateResult {
            index: 0,
            source_path: candidate.path.clone(),
            target_path: Some(PathBuf::from(
                "/in/Project Hail Mary (2021) (Andy Weir) {ASIN.B000000002}",
            )),
            identity: Some("B000000002".parse().expect("identity")),
            resolution: Some(ResolutionSource::Search),
            confidence: Some(0.92),
            outcome: Outcome::Renamed,
            trump: None,
            safety: None,
            detail: "renamed | ok".to_string(),
        };
        let results = vec![result];
        ReconcileReport {
            generated_at: Timestamp::now(),
            source_dir: PathBuf::from("/in"),
            dry_run: false,
            summary: ReconcileSummary::from_results(&results),
            results,
            collisions: Vec::new(),
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ExporterRegistry::with_defaults();
        assert_eq!(registry.formats(), vec!["json", "markdown"]);
        assert_eq!(registry.get("JSON").expect("json").extension(), "json");
        assert!(matches!(
            registry.get("xml"),
            Err(LibraryError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_json_export() {
        let rendered = JsonExporter.render(&report()).expect("render");
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value["summary"]["renamed"], 1);
        assert_eq!(value["results"][0]["outcome"], "renamed");
        assert_eq!(value["results"][0]["resolution"], "search");
        assert_eq!(value["results"][0]["identity"], "B000000002");
    }

    #[test]
    fn test_markdown_export() {
        let rendered = MarkdownExporter.render(&report()).expect("render");
        assert!(rendered.contains("# Reconciliation report"));
        assert!(rendered.contains("| 1 | 1 | 0 |"));
        assert!(rendered.contains("0.92"));
        assert!(rendered.contains("renamed \\| ok"));
    }

    #[test]
    fn test_export_writes_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("report.md");
        ExporterRegistry::with_defaults()
            .export("markdown", &report(), &path)
            .expect("export");
        assert!(fs::read_to_string(&path).expect("read").contains("Candidates"));
    }
}
