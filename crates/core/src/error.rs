//! Error taxonomy and recovery guidance for audioshelf
//!
//! Errors fall into two severity tiers:
//! - **PerCandidate**: folded into a single candidate's result; the batch continues
//! - **Fatal**: aborts the invocation before any candidate is processed
//!
//! Every error carries a recovery action whose `remediation` text tells the
//! operator what to do next, not just what went wrong.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// What an operator (or the pipeline) should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing to do; the candidate is reported and skipped
    ReportAndSkip,
    /// Review the item by hand, rerun with `--force` if the change is right
    ReviewManually,
    /// Another run holds the lock, or a stale lock file needs removing
    ReleaseLock,
    /// Restore the state file from a backup or reset it explicitly
    RestoreBackup,
    /// Fix the configuration file or command-line flags
    FixConfiguration,
    /// The remote service failed; retry the invocation later
    RetryLater,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReportAndSkip => write!(f, "Reported and skipped"),
            Self::ReviewManually => write!(f, "Manual review required"),
            Self::ReleaseLock => write!(f, "Lock must be released"),
            Self::RestoreBackup => write!(f, "Restore from backup"),
            Self::FixConfiguration => write!(f, "Fix configuration"),
            Self::RetryLater => write!(f, "Retry later"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Confined to one candidate; the batch keeps going
    PerCandidate,
    /// Aborts the whole invocation
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerCandidate => write!(f, "Per-candidate"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for audioshelf
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Pre-flight =====
    /// Bad or missing settings
    #[error("Invalid configuration: {setting} ({reason})")]
    Configuration { setting: String, reason: String },

    // ===== Per-candidate =====
    /// Identity could not be determined with enough confidence
    #[error("Could not resolve identity for {path}: {reason}")]
    Resolution { path: PathBuf, reason: String },

    /// Current and proposed title/author are too dissimilar
    #[error("Suspicious change for {path}: '{from}' -> '{to}' (similarity {similarity:.2})")]
    SafetyFlag {
        path: PathBuf,
        from: String,
        to: String,
        similarity: f64,
    },

    /// Rename or hardlink failed
    #[error("Staging failed moving {from} to {to}: {message}")]
    Staging {
        from: PathBuf,
        to: PathBuf,
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    // ===== Process-wide =====
    /// Another process holds the run lock, or the state lock could not be taken
    #[error("State is locked: {path}")]
    StateLocked { path: PathBuf },

    /// The state document failed validation on load
    #[error("State file {path} is corrupted: {reason}")]
    StateCorrupted { path: PathBuf, reason: String },

    /// The library could not be enumerated, so duplicates cannot be ruled out
    #[error("Library '{library}' unavailable: {reason}")]
    LibraryUnavailable { library: String, reason: String },

    /// General I/O error
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Resolution { .. } | Self::SafetyFlag { .. } | Self::Staging { .. } => {
                ErrorSeverity::PerCandidate
            }

            Self::Configuration { .. }
            | Self::StateLocked { .. }
            | Self::StateCorrupted { .. }
            | Self::LibraryUnavailable { .. }
            | Self::Io { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::Resolution { .. } | Self::Staging { .. } => RecoveryAction::ReportAndSkip,
            Self::SafetyFlag { .. } => RecoveryAction::ReviewManually,
            Self::StateLocked { .. } => RecoveryAction::ReleaseLock,
            Self::StateCorrupted { .. } => RecoveryAction::RestoreBackup,
            Self::Configuration { .. } => RecoveryAction::FixConfiguration,
            Self::LibraryUnavailable { .. } | Self::Io { .. } => RecoveryAction::RetryLater,
        }
    }

    /// Operator-facing instructions for getting unstuck
    pub fn remediation(&self) -> String {
        match self {
            Self::Configuration { setting, .. } => {
                format!("Correct '{}' in the config file or pass a valid flag.", setting)
            }
            Self::Resolution { .. } => {
                "Add an identity tag to the folder name or enable external search.".to_string()
            }
            Self::SafetyFlag { .. } => {
                "Check the proposed name by hand; rerun with --force to accept it.".to_string()
            }
            Self::Staging { .. } => {
                "Check permissions and free space on the target volume, then rerun.".to_string()
            }
            Self::StateLocked { path } => format!(
                "Another audioshelf run appears to be active. If none is, remove the stale lock file at {} and retry.",
                path.display()
            ),
            Self::StateCorrupted { path, .. } => format!(
                "Restore {} from a backup, or run `audioshelf reset-state --yes` to start over (a backup is written first).",
                path.display()
            ),
            Self::LibraryUnavailable { library, .. } => format!(
                "Library '{}' could not be read, so duplicates cannot be ruled out. Retry once it is reachable.",
                library
            ),
            Self::Io { .. } => "Check the path and permissions, then retry.".to_string(),
        }
    }

    /// Returns true if this error must stop the whole invocation
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Helper to create a staging error from an OS error
    pub fn staging(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Staging {
            from: from.into(),
            to: to.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(RecoveryAction::ReleaseLock.to_string(), "Lock must be released");
        assert_eq!(RecoveryAction::RestoreBackup.to_string(), "Restore from backup");
        assert_eq!(RecoveryAction::ReviewManually.to_string(), "Manual review required");
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::PerCandidate < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_candidate_errors_are_not_fatal() {
        let err = AppError::Resolution {
            path: PathBuf::from("/incoming/Some Book"),
            reason: "low confidence".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::PerCandidate);
        assert_eq!(err.recovery_action(), RecoveryAction::ReportAndSkip);
        assert!(!err.is_fatal());

        let flag = AppError::SafetyFlag {
            path: PathBuf::from("/incoming/x"),
            from: "Dune".to_string(),
            to: "Emma".to_string(),
            similarity: 0.1,
        };
        assert_eq!(flag.recovery_action(), RecoveryAction::ReviewManually);
        assert!(flag.to_string().contains("0.10"));
    }

    #[test]
    fn test_lock_error_surfaces_path() {
        let err = AppError::StateLocked {
            path: PathBuf::from("/var/lib/audioshelf/state.json.run.lock"),
        };
        assert!(err.is_fatal());
        assert!(err.remediation().contains("state.json.run.lock"));
        assert!(err.remediation().contains("stale lock"));
    }

    #[test]
    fn test_corruption_points_at_backup() {
        let err = AppError::StateCorrupted {
            path: PathBuf::from("state.json"),
            reason: "missing field `processed`".to_string(),
        };
        assert_eq!(err.recovery_action(), RecoveryAction::RestoreBackup);
        assert!(err.remediation().contains("reset-state"));
    }

    #[test]
    fn test_staging_helper_keeps_source() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::staging("/a", "/b", io_err);
        assert!(err.to_string().contains("denied"));
        assert!(err.source().is_some());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let err: AppError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, AppError::Io { .. }));
    }
}
