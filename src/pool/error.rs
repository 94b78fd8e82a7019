//! Worker pool error types.

use std::fmt;
use std::time::Duration;

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The submitted task was rejected before it was enqueued.
    InvalidTask(String),

    /// The bounded queue is full and the submission was non-blocking.
    Saturated {
        /// Maximum queue capacity.
        capacity: usize,
    },

    /// The pool has been shut down (or is shutting down).
    Closed,

    /// The pool configuration is invalid.
    InvalidConfig(String),

    /// A worker thread could not be spawned.
    Spawn(String),

    /// The task panicked while executing.
    TaskPanicked(String),

    /// The task's deadline elapsed before a worker started it.
    Expired,

    /// The task was discarded by a non-graceful shutdown and never ran.
    Cancelled,

    /// Waiting for a task result timed out.
    Timeout(Duration),

    /// The process-wide pool was already initialized.
    AlreadyInitialized,

    /// The process-wide pool has not been initialized.
    NotInitialized,
}

impl PoolError {
    /// Check if this is a saturation error.
    pub fn is_saturated(&self) -> bool {
        matches!(self, PoolError::Saturated { .. })
    }

    /// Check if this is a closed-pool error.
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed)
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout(_))
    }

    /// Check if this is a task-level failure (the task itself did not produce a value).
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self,
            PoolError::TaskPanicked(_) | PoolError::Expired | PoolError::Cancelled
        )
    }

    /// Get the error message for logging.
    pub fn message(&self) -> &str {
        match self {
            PoolError::InvalidTask(_) => "Invalid task",
            PoolError::Saturated { .. } => "Pool saturated",
            PoolError::Closed => "Pool closed",
            PoolError::InvalidConfig(_) => "Invalid configuration",
            PoolError::Spawn(_) => "Worker spawn failed",
            PoolError::TaskPanicked(_) => "Task panicked",
            PoolError::Expired => "Task expired",
            PoolError::Cancelled => "Task cancelled",
            PoolError::Timeout(_) => "Result timeout",
            PoolError::AlreadyInitialized => "Already initialized",
            PoolError::NotInitialized => "Not initialized",
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidTask(reason) => write!(f, "invalid task: {}", reason),
            PoolError::Saturated { capacity } => {
                write!(f, "pool saturated: queue holds {} pending tasks", capacity)
            }
            PoolError::Closed => write!(f, "pool has been shut down"),
            PoolError::InvalidConfig(reason) => write!(f, "invalid pool configuration: {}", reason),
            PoolError::Spawn(reason) => write!(f, "failed to spawn worker thread: {}", reason),
            PoolError::TaskPanicked(msg) => write!(f, "task panicked: {}", msg),
            PoolError::Expired => write!(f, "task deadline elapsed before execution"),
            PoolError::Cancelled => write!(f, "task was discarded before execution"),
            PoolError::Timeout(duration) => {
                write!(f, "result timeout after {}ms", duration.as_millis())
            }
            PoolError::AlreadyInitialized => write!(f, "global pool is already initialized"),
            PoolError::NotInitialized => write!(f, "global pool is not initialized"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
