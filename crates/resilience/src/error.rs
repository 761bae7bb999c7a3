//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The operation's thread went away without producing a result
    #[error("Operation aborted: {0}")]
    Aborted(String),

    /// The worker threads could not be started
    #[error("Worker pool could not start: {0}")]
    PoolStart(#[from] rayon::ThreadPoolBuildError),
}
