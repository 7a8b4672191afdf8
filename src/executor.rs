//! Bounded worker-pool executor behind `par_map`.
//!
//! The pool only lives for one `execute` call: workers are spawned in a
//! `std::thread::scope`, fed through a bounded channel from the calling
//! thread, and joined before `execute` returns. Results come back in
//! completion order, not submission order.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::Producer;

/// Something that can map a producer's values on several workers.
///
/// Implementations submit one unit of work per `Ok` input, forward input
/// errors unchanged, and make no promise about result order.
pub trait ParallelExecutor {
    fn execute<'a, T, U, F>(&self, inputs: Producer<'a, T>, f: &F) -> Vec<Result<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync;
}

/// Sizing for a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the task queue between the feeder and the workers.
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            workers,
            queue_depth: 2 * workers,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count, keeping the queue at twice its size.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self.queue_depth = 2 * workers;
        self
    }

    pub fn queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }
}

/// Scoped thread pool used by `par_map`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(PipelineError::PoolUnavailable(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// A pool sized to the machine's available parallelism.
    pub fn with_default_size() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl ParallelExecutor for WorkerPool {
    fn execute<'a, T, U, F>(&self, inputs: Producer<'a, T>, f: &F) -> Vec<Result<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync,
    {
        let workers = self.config.workers;
        // A zero-capacity channel would turn every submission into a rendezvous.
        let (task_tx, task_rx) = bounded::<T>(self.config.queue_depth.max(1));
        let (result_tx, result_rx) = unbounded::<Result<U>>();
        debug!(workers, queue_depth = self.config.queue_depth, "starting worker pool");

        let submitted = thread::scope(|scope| {
            for worker in 0..workers {
                let tasks = task_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || {
                    for task in tasks {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(task)))
                            .map_err(|payload| {
                                let message = panic_message(payload.as_ref());
                                warn!(worker, %message, "worker panicked while mapping an element");
                                PipelineError::WorkerPanicked { message }
                            });
                        if results.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(task_rx);

            let mut submitted = 0usize;
            for item in inputs {
                match item {
                    Ok(task) => {
                        if task_tx.send(task).is_err() {
                            break;
                        }
                        submitted += 1;
                    }
                    Err(err) => {
                        let _ = result_tx.send(Err(err));
                    }
                }
            }
            drop(task_tx);
            drop(result_tx);
            submitted
        });

        let results: Vec<Result<U>> = result_rx.into_iter().collect();
        debug!(submitted, returned = results.len(), "worker pool finished");
        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
