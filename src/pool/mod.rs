//! Bounded worker pool.
//!
//! A fixed number of worker threads pull tasks from one shared FIFO queue.
//! The queue can be bounded (submitters block, or fail fast with
//! [`PoolError::Saturated`]), a zero-capacity hand-off, or unbounded.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      WorkerPool                            │
//! ├────────────────────────────────────────────────────────────┤
//! │  submit() / try_submit() / submit_with_result()            │
//! │                      │                                     │
//! │              ┌───────▼───────┐                             │
//! │              │   TaskQueue   │  (crossbeam channel,        │
//! │              └───────┬───────┘   bounded or unbounded)     │
//! │       ┌──────────────┼──────────────┐                      │
//! │  ┌────▼────┐    ┌────▼────┐    ┌────▼────┐                 │
//! │  │ worker-0│    │ worker-1│    │ worker-2│  ...            │
//! │  └─────────┘    └─────────┘    └─────────┘                 │
//! │   Idle → Executing → Idle ... → Draining → Terminated       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bounded_pool::pool::WorkerPool;
//!
//! let pool = WorkerPool::builder().workers(3).queue_capacity(16).build()?;
//! pool.submit(|| println!("hello from a worker"))?;
//! let answer = pool.submit_with_result(|| 6 * 7)?;
//! assert_eq!(answer.join()?, 42);
//! pool.shutdown(true);
//! # Ok::<(), bounded_pool::pool::PoolError>(())
//! ```

mod error;
mod queue;
mod task;
mod thread;
mod worker;

pub use error::{PoolError, PoolResult};
pub use queue::QueueCapacity;
pub use task::{log_failure, ErrorHook, FailureKind, Task, TaskFailure, TaskHandle};
pub use thread::{PoolBuilder, WorkerPool, DEFAULT_QUEUE_MULTIPLIER};
pub use worker::WorkerState;

use serde::Serialize;

/// Lifecycle of the pool as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Accepting submissions.
    Running,
    /// Shutdown initiated, some workers still alive.
    ShuttingDown,
    /// Every worker has exited.
    Terminated,
}

/// Statistics about pool activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool name.
    pub name: String,
    /// Current lifecycle state.
    pub state: PoolState,
    /// Number of workers.
    pub workers: usize,
    /// Queue capacity (`None` = unbounded).
    pub queue_capacity: Option<usize>,
    /// Tasks waiting in the queue.
    pub pending: usize,
    /// Workers currently running a task.
    pub busy: usize,
    /// Tasks accepted into the queue.
    pub submitted: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
    /// Tasks skipped because their deadline passed.
    pub expired: u64,
    /// Submissions rejected (invalid, saturated or closed).
    pub rejected: u64,
    /// Tasks dropped by a non-graceful shutdown.
    pub discarded: u64,
}
