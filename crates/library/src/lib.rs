//! audioshelf library reconciliation
//!
//! Orchestration layer over the matching, trump, resilience and state crates.
//! Takes candidate folders from a source directory, resolves their identity,
//! checks them against the managed library and renames or imports them.
//!
//! Collaborators sit behind traits ([`LibraryClient`], [`MetadataSearch`],
//! [`QualityInspector`]); [`LocalLibrary`], [`CatalogSearch`] and
//! [`FileInspector`] are the filesystem-backed implementations.

pub mod candidate;
pub mod catalog;
pub mod client;
pub mod error;
pub mod index;
pub mod inspector;
pub mod local;
pub mod naming;
pub mod pipeline;
pub mod report;

pub use candidate::{discover_candidates, CandidateFolder};
pub use catalog::CatalogSearch;
pub use client::{
    BookMetadata, LibraryClient, LibraryItem, MetadataSearch, Page, QualityInspector,
    SearchCandidate,
};
pub use error::{LibraryError, LibraryResult};
pub use index::{
    build_identity_index, DuplicateSet, IdentityCollision, IdentityIndex, LibraryEntry, PAGE_SIZE,
};
pub use inspector::FileInspector;
pub use local::LocalLibrary;
pub use naming::{parse_folder_name, sanitize_component, NamingTemplate};
pub use pipeline::{
    run_reconciliation, CandidateResult, Outcome, ReconcileContext, ReconcileOptions,
    ReconcileRun, ReconcileSummary, ResolutionSource, StagingMode,
};
pub use report::{
    ExporterRegistry, JsonExporter, MarkdownExporter, ReconcileReport, ReportExporter,
};
