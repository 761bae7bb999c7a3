//! Lock-protected, crash-safe access to the state file
//!
//! Every mutation reads the whole document, mutates it and writes it to a
//! temporary file in the same directory before renaming it over the original,
//! all under the state-file lock. A crash at any point leaves either the old
//! or the new document on disk.

use crate::document::{
    failed_key, FailedRecord, ProcessedRecord, RecordStatus, Stage, StateDocument,
};
use crate::error::{StateError, StateResult};
use crate::lock::{FileLock, LockGuard};
use audioshelf_core::{Identity, Timestamp};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Counts reported by `status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub processed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub version: u32,
}

/// A serialized document waiting for its atomic rename
///
/// Dropping it without [`commit`](PendingWrite::commit) deletes the temporary
/// file and leaves the state file untouched.
#[derive(Debug)]
pub struct PendingWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl PendingWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Renames the temporary file into place
    pub fn commit(self) -> StateResult<()> {
        self.temp
            .persist(&self.target)
            .map_err(|e| StateError::WriteError {
                path: self.target.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Handle on one state file and its two sibling locks
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    state_lock: FileLock,
    run_lock: FileLock,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            state_lock: FileLock::new(sibling(&path, ".lock")),
            run_lock: FileLock::new(sibling(&path, ".run.lock")),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        self.state_lock.path()
    }

    pub fn run_lock_path(&self) -> &Path {
        self.run_lock.path()
    }

    /// Takes the library-wide run lock without waiting
    ///
    /// With `force` the lock is not taken at all; the override is logged.
    pub fn acquire_run_lock(&self, force: bool) -> StateResult<LockGuard> {
        if force {
            log::warn!(
                "Run lock {} bypassed by operator override",
                self.run_lock.path().display()
            );
            return Ok(LockGuard::bypassed(self.run_lock.path()));
        }
        self.run_lock.try_acquire()
    }

    /// Reads and validates the document under the state lock
    pub fn load(&self) -> StateResult<StateDocument> {
        let _guard = self.state_lock.acquire()?;
        self.read_document()
    }

    fn read_document(&self) -> StateResult<StateDocument> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No state file at {}, starting empty", self.path.display());
                return Ok(StateDocument::default());
            }
            Err(source) => {
                return Err(StateError::ReadError {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Err(self.corrupted("file is empty"));
        }

        let value: serde_json::Value =
            serde_json::from_str(&contents).map_err(|e| self.corrupted(e.to_string()))?;
        StateDocument::from_value(value).map_err(|reason| self.corrupted(reason))
    }

    fn corrupted(&self, reason: impl Into<String>) -> StateError {
        StateError::Corrupted {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Serializes `document` to a synced temporary file beside the state file
    pub fn prepare_write(&self, document: &StateDocument) -> StateResult<PendingWrite> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| StateError::WriteError {
            path: dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(document)?;
        let write_err = |source| StateError::WriteError {
            path: self.path.clone(),
            source,
        };
        let mut temp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        temp.write_all(json.as_bytes()).map_err(write_err)?;
        temp.write_all(b"\n").map_err(write_err)?;
        temp.flush().map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;

        Ok(PendingWrite {
            temp,
            target: self.path.clone(),
        })
    }

    /// Read-modify-write cycle under the state lock
    pub fn update<T>(&self, mutate: impl FnOnce(&mut StateDocument) -> T) -> StateResult<T> {
        let _guard = self.state_lock.acquire()?;
        let mut document = self.read_document()?;
        let output = mutate(&mut document);
        self.prepare_write(&document)?.commit()?;
        Ok(output)
    }

    /// Records an identity as complete, merging any earlier checkpoints
    pub fn mark_processed(&self, identity: &Identity, record: ProcessedRecord) -> StateResult<()> {
        self.update(|doc| {
            let mut record = record;
            record.status = RecordStatus::Complete;
            if let Some(previous) = doc.processed.get(identity) {
                record.checkpoints.merge(&previous.checkpoints);
            }
            if let Some(failure) = doc.failed.remove(identity.as_str()) {
                record.checkpoints.merge(&failure.checkpoints);
            }
            doc.processed.insert(identity.clone(), record);
        })?;
        log::info!("Marked {} processed", identity);
        Ok(())
    }

    /// Records a failure, moving the identity out of `processed` if present
    ///
    /// Returns the retry count after this failure.
    pub fn mark_failed(
        &self,
        identity: Option<&Identity>,
        title: &str,
        path: Option<&Path>,
        error: &str,
    ) -> StateResult<u32> {
        let key = failed_key(identity, path);
        let retry_count = self.update(|doc| {
            let previous = doc.failed.remove(&key);
            let carried = identity
                .and_then(|id| doc.processed.remove(id))
                .map(|record| record.checkpoints);

            let mut checkpoints = previous
                .as_ref()
                .map(|p| p.checkpoints.clone())
                .unwrap_or_default();
            if let Some(carried) = carried {
                checkpoints.merge(&carried);
            }
            let retry_count = previous.as_ref().map_or(0, |p| p.retry_count + 1);

            doc.failed.insert(
                key.clone(),
                FailedRecord {
                    identity: identity.cloned(),
                    title: title.to_string(),
                    path: path.map(Path::to_path_buf),
                    error: error.to_string(),
                    failed_at: Timestamp::now(),
                    retry_count,
                    checkpoints,
                },
            );
            retry_count
        })?;
        log::warn!("Marked {} failed (retry {}): {}", key, retry_count, error);
        Ok(retry_count)
    }

    /// Records that `stage` finished for `identity` at `at`
    pub fn checkpoint_stage(
        &self,
        identity: &Identity,
        stage: Stage,
        at: Timestamp,
    ) -> StateResult<()> {
        self.update(|doc| {
            if let Some(failure) = doc.failed.get_mut(identity.as_str()) {
                failure.checkpoints.set(stage, at);
            } else if let Some(record) = doc.processed.get_mut(identity) {
                record.checkpoints.set(stage, at);
            } else {
                let mut record = ProcessedRecord::new(String::new());
                record.status = RecordStatus::InProgress;
                record.processed_at = at;
                record.checkpoints.set(stage, at);
                doc.processed.insert(identity.clone(), record);
            }
        })?;
        log::debug!("Checkpoint {} for {}", stage, identity);
        Ok(())
    }

    pub fn is_processed(&self, identity: &Identity) -> StateResult<bool> {
        Ok(self.load()?.is_processed(identity))
    }

    /// True when `stage` already has a checkpoint for `identity`
    pub fn should_skip_stage(&self, identity: &Identity, stage: Stage) -> StateResult<bool> {
        Ok(self.load()?.checkpoint(identity, stage).is_some())
    }

    /// Forgets an identity (or a `path:` failure key) in both maps
    pub fn clear(&self, key: &str) -> StateResult<bool> {
        let removed = self.update(|doc| {
            let from_processed = Identity::parse(key)
                .ok()
                .and_then(|id| doc.processed.remove(&id))
                .is_some();
            let normalized = Identity::parse(key)
                .map(|id| id.to_string())
                .unwrap_or_else(|_| key.to_string());
            let from_failed = doc.failed.remove(&normalized).is_some();
            from_processed || from_failed
        })?;
        if removed {
            log::info!("Cleared state for {}", key);
        }
        Ok(removed)
    }

    pub fn status(&self) -> StateResult<StateSummary> {
        let doc = self.load()?;
        let in_progress = doc
            .processed
            .values()
            .filter(|record| !record.is_complete())
            .count();
        Ok(StateSummary {
            processed: doc.processed.len() - in_progress,
            in_progress,
            failed: doc.failed.len(),
            version: doc.version,
        })
    }

    /// Failures still under the retry ceiling, oldest first
    pub fn failed_for_retry(&self, max_retries: u32) -> StateResult<Vec<FailedRecord>> {
        let mut failures: Vec<FailedRecord> = self
            .load()?
            .failed
            .into_values()
            .filter(|record| record.retry_count < max_retries)
            .collect();
        failures.sort_by_key(|record| record.failed_at);
        Ok(failures)
    }

    /// Replaces the document with an empty one after backing it up
    ///
    /// Works on a corrupted file too; returns the backup path when there was
    /// something to back up.
    pub fn reset(&self) -> StateResult<Option<PathBuf>> {
        let _guard = self.state_lock.acquire()?;
        let backup = if self.path.exists() {
            let backup = sibling(
                &self.path,
                &format!(".{}.bak", Timestamp::now().file_stamp()),
            );
            fs::copy(&self.path, &backup).map_err(|source| StateError::WriteError {
                path: backup.clone(),
                source,
            })?;
            log::warn!("Backed up state to {}", backup.display());
            Some(backup)
        } else {
            None
        };
        self.prepare_write(&StateDocument::default())?.commit()?;
        log::warn!("State reset at {}", self.path.display());
        Ok(backup)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
