//! Persistent reconciliation state
//!
//! A single JSON document records which identities are processed, which
//! failed and which workflow stages are checkpointed. Two advisory locks sit
//! beside it: `<state>.lock` guards each read-modify-write, and
//! `<state>.run.lock` keeps a second pipeline invocation off the library.

mod document;
mod error;
mod lock;
mod store;

pub use document::{
    failed_key, Checkpoints, FailedRecord, ProcessedRecord, RecordStatus, Stage, StateDocument,
    STATE_VERSION,
};
pub use error::{StateError, StateResult};
pub use lock::{FileLock, LockGuard};
pub use store::{PendingWrite, StateStore, StateSummary};
