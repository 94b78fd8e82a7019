//! bounded_pool - fixed-size worker pools and reusable resource slots.
//!
//! A [`WorkerPool`] runs submitted closures on a fixed set of named threads
//! fed by one FIFO queue. The queue is bounded by default, so producers feel
//! backpressure (blocking `submit`) or get [`PoolError::Saturated`]
//! (`try_submit`). Shutdown is graceful (drain the queue) or immediate
//! (discard what has not started); either way no task is cut off mid-run.
//!
//! A [`SlotPool`] is the acquire/release counterpart: N reusable resources,
//! at most one holder each.
//!
//! # Example
//!
//! ```rust,ignore
//! use bounded_pool::{SlotPool, WorkerPool};
//!
//! let pool = WorkerPool::builder().workers(3).name("io").build()?;
//! let sum = pool.submit_with_result(|| (1..=10).sum::<u32>())?;
//! assert_eq!(sum.join()?, 55);
//! pool.shutdown(true);
//!
//! let conns = SlotPool::with_factory(3, |i| format!("conn-{i}"))?;
//! let handle = conns.acquire().expect("free slot");
//! conns.release(handle)?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod global;
pub mod logging;
pub mod observability;
pub mod pool;
pub mod slots;

// Re-exports for convenience
pub use config::Config;
pub use pool::{PoolBuilder, PoolError, PoolResult, PoolStats, Task, TaskHandle, WorkerPool};
pub use slots::{AcquireMode, SlotError, SlotHandle, SlotPool};
