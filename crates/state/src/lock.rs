//! Advisory file locks with scoped release
//!
//! Lock files are created empty and never written; they exist only as a
//! handle for the OS lock. Dropping the guard releases the lock on every exit
//! path, including unwinding.

use crate::error::{StateError, StateResult};
use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

/// An exclusive advisory lock on a sibling lock file
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until the lock is free
    pub fn acquire(&self) -> StateResult<LockGuard> {
        let file = self.open()?;
        file.lock().map_err(|source| StateError::WriteError {
            path: self.path.clone(),
            source,
        })?;
        log::trace!("Acquired lock {}", self.path.display());
        Ok(LockGuard::held(file, self.path.clone()))
    }

    /// Fails fast with [`StateError::Locked`] when another holder exists
    pub fn try_acquire(&self) -> StateResult<LockGuard> {
        let file = self.open()?;
        match file.try_lock() {
            Ok(()) => {
                log::debug!("Acquired lock {}", self.path.display());
                Ok(LockGuard::held(file, self.path.clone()))
            }
            Err(TryLockError::WouldBlock) => Err(StateError::Locked {
                path: self.path.clone(),
            }),
            Err(TryLockError::Error(source)) => Err(StateError::WriteError {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn open(&self) -> StateResult<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StateError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|source| StateError::WriteError {
                path: self.path.clone(),
                source,
            })
    }
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: PathBuf,
}

impl LockGuard {
    fn held(file: File, path: PathBuf) -> Self {
        Self {
            file: Some(file),
            path,
        }
    }

    /// A guard that holds nothing, for operator overrides
    pub fn bypassed(path: impl Into<PathBuf>) -> Self {
        Self {
            file: None,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_bypassed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.unlock() {
                log::warn!("Failed to release lock {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_try_acquire_fails_fast() {
        let dir = TempDir::new().expect("temp dir");
        let lock = FileLock::new(dir.path().join("state.json.run.lock"));

        let _held = lock.try_acquire().expect("first acquire");
        let second = lock.try_acquire();
        assert!(matches!(second, Err(StateError::Locked { .. })));
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().expect("temp dir");
        let lock = FileLock::new(dir.path().join("x.lock"));

        drop(lock.try_acquire().expect("first acquire"));
        assert!(lock.try_acquire().is_ok());
    }

    #[test]
    fn test_lock_file_stays_empty() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("state.json.lock");
        let lock = FileLock::new(&path);

        let guard = lock.acquire().expect("acquire");
        assert_eq!(guard.path(), path.as_path());
        assert_eq!(fs::metadata(&path).expect("metadata").len(), 0);
    }

    #[test]
    fn test_released_after_panic() {
        let dir = TempDir::new().expect("temp dir");
        let lock = FileLock::new(dir.path().join("p.lock"));

        let result = std::panic::catch_unwind(|| {
            let _guard = lock.try_acquire().expect("acquire");
            panic!("worker died");
        });
        assert!(result.is_err());
        assert!(lock.try_acquire().is_ok());
    }

    #[test]
    fn test_bypassed_guard() {
        let guard = LockGuard::bypassed("/tmp/none.lock");
        assert!(guard.is_bypassed());
    }
}
