//! Bounded worker pool over a fixed batch of items

use crate::cancel::CancellationToken;
use crate::error::ResilienceResult;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// What happened to one item of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<R> {
    /// The task ran to completion
    Completed(R),
    /// The task panicked; the payload message is kept
    Panicked(String),
    /// Cancellation arrived before the item was picked up
    NotStarted,
}

impl<R> TaskOutcome<R> {
    pub fn completed(self) -> Option<R> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Fixed-width rayon pool dedicated to one batch runner
///
/// Every item is its own unit of work, so an idle worker can pick up any
/// pending item. Once the token is cancelled, items that have not started
/// are reported as [`TaskOutcome::NotStarted`]; started items finish.
/// Results are returned in item order regardless of completion order.
#[derive(Debug)]
pub struct WorkerPool {
    width: usize,
    pool: ThreadPool,
}

impl WorkerPool {
    /// Creates a pool; a width of zero is treated as one
    pub fn new(width: usize) -> ResilienceResult<Self> {
        let width = width.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|index| format!("audioshelf-worker-{}", index))
            .build()?;
        Ok(Self { width, pool })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Runs `task` over every item and waits for all of them
    pub fn run<T, R, F>(
        &self,
        items: &[T],
        cancel: &CancellationToken,
        task: F,
    ) -> Vec<TaskOutcome<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Sync,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .with_max_len(1)
                .map(|(index, item)| {
                    if cancel.is_cancelled() {
                        return TaskOutcome::NotStarted;
                    }
                    match panic::catch_unwind(AssertUnwindSafe(|| task(index, item))) {
                        Ok(value) => TaskOutcome::Completed(value),
                        Err(payload) => TaskOutcome::Panicked(panic_message(payload.as_ref())),
                    }
                })
                .collect()
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
