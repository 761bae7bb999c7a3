use audioshelf_core::AppError;
use audioshelf_resilience::ResilienceError;
use audioshelf_state::StateError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    /// The library client could not enumerate items
    #[error("Library '{library}' unavailable: {reason}")]
    Unavailable { library: String, reason: String },

    /// External metadata search failed or timed out
    #[error("Search failed: {0}")]
    Search(String),

    #[error("Catalog {path} could not be read: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Rename, hardlink or archive step failed
    #[error("Staging failed moving {from} to {to}: {source}")]
    Staging {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unknown report format '{0}'")]
    UnknownFormat(String),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Task error: {0}")]
    Resilience(#[from] ResilienceError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

impl LibraryError {
    pub fn staging(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Staging {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::Unavailable { library, reason } => {
                AppError::LibraryUnavailable { library, reason }
            }
            LibraryError::Staging { from, to, source } => AppError::staging(from, to, source),
            LibraryError::State(e) => e.into(),
            LibraryError::Io(source) => source.into(),
            LibraryError::InvalidPattern { pattern, reason } => AppError::Configuration {
                setting: format!("--pattern {}", pattern),
                reason,
            },
            LibraryError::UnknownFormat(format) => AppError::Configuration {
                setting: "--format".to_string(),
                reason: format!("unknown report format '{}'", format),
            },
            LibraryError::Catalog { path, reason } => AppError::Configuration {
                setting: format!("reconcile.catalog_path ({})", path.display()),
                reason,
            },
            LibraryError::DirectoryNotFound(path) => AppError::Io {
                message: format!("directory not found: {}", path.display()),
                source: io::Error::new(io::ErrorKind::NotFound, path.display().to_string()),
            },
            other => AppError::Io {
                message: other.to_string(),
                source: io::Error::other(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_fatal() {
        let err: AppError = LibraryError::Unavailable {
            library: "main".to_string(),
            reason: "connection refused".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.remediation().contains("main"));
    }

    #[test]
    fn test_staging_is_per_candidate() {
        let err: AppError = LibraryError::staging(
            "/in/a",
            "/in/b",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        )
        .into();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("denied"));
    }
}
