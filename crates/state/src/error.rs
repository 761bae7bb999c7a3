//! Error types for the state store

use audioshelf_core::AppError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// A non-blocking acquisition found the lock held elsewhere
    #[error("Lock is held by another process: {path}")]
    Locked { path: PathBuf },

    /// The document failed structural or typed validation
    #[error("State file {path} is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    SerializeError(#[from] serde_json::Error),
}

impl From<StateError> for AppError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Locked { path } => AppError::StateLocked { path },
            StateError::Corrupted { path, reason } => AppError::StateCorrupted { path, reason },
            StateError::ReadError { path, source } | StateError::WriteError { path, source } => {
                AppError::Io {
                    message: format!("{}: {}", path.display(), source),
                    source,
                }
            }
            StateError::SerializeError(e) => AppError::Io {
                message: e.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_maps_to_fatal_app_error() {
        let err: AppError = StateError::Locked {
            path: PathBuf::from("/data/state.json.run.lock"),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.remediation().contains("state.json.run.lock"));
    }

    #[test]
    fn test_corrupted_maps_to_app_error() {
        let err: AppError = StateError::Corrupted {
            path: PathBuf::from("state.json"),
            reason: "not an object".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::StateCorrupted { .. }));
    }
}
