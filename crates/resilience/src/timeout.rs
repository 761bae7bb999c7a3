//! Timeout handling utilities
//!
//! The operation runs on its own thread and the caller stops waiting once the
//! deadline passes. A timed-out operation is abandoned, not interrupted, so it
//! must not perform mutations the caller relies on.

use crate::error::{ResilienceError, ResilienceResult};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Executes an operation with a timeout
pub fn with_timeout<F, T>(duration: Duration, operation: F) -> ResilienceResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("timeout-op".to_string())
        .spawn(move || {
            // Receiver may already be gone after a timeout
            let _ = sender.send(operation());
        })
        .map_err(|e| ResilienceError::Aborted(e.to_string()))?;

    match receiver.recv_timeout(duration) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ResilienceError::Timeout(duration)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ResilienceError::Aborted(
            "operation panicked before returning".to_string(),
        )),
    }
}

/// Timeout wrapper for operations
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    /// Creates a new timeout
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Gets the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Executes an operation with this timeout
    pub fn execute<F, T>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        with_timeout(self.duration, operation)
    }
}
