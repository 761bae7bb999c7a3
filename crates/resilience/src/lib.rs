//! Concurrency and fault-containment helpers
//!
//! This module provides:
//! - Bounded worker pool with panic containment
//! - Cooperative cancellation
//! - Timeout handling
//!
//! # Example
//!
//! ```rust
//! use audioshelf_resilience::{CancellationToken, TaskOutcome, WorkerPool};
//!
//! let pool = WorkerPool::new(4).expect("pool");
//! let results = pool.run(&[1, 2, 3], &CancellationToken::new(), |_, n| n * 10);
//! assert_eq!(results[2], TaskOutcome::Completed(30));
//! ```

mod cancel;
mod error;
mod pool;
mod timeout;

pub use cancel::CancellationToken;
pub use error::{ResilienceError, ResilienceResult};
pub use pool::{TaskOutcome, WorkerPool};
pub use timeout::{with_timeout, Timeout};
