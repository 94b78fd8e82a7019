//! Worker pool configuration.

use std::num::NonZeroUsize;

use super::parse::env_or;
use super::ConfigError;
use crate::pool::{PoolBuilder, QueueCapacity, WorkerPool, DEFAULT_QUEUE_MULTIPLIER};

/// Worker pool configuration loaded from environment.
///
/// Worker count and capacity are resolved at load time.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Pool name and thread name prefix.
    pub name: String,
    /// Resolved worker count (never zero).
    worker_count: NonZeroUsize,
    /// Resolved queue capacity.
    capacity: QueueCapacity,
}

impl PoolConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let worker_count = parse_worker_count(&env_or("POOL_WORKERS", "0"))?;
        let capacity = parse_queue_capacity(&env_or("POOL_QUEUE_CAPACITY", "auto"), worker_count)?;
        let name = env_or("POOL_NAME", "worker");
        if name.is_empty() {
            return Err(ConfigError::Invalid {
                key: "POOL_NAME".into(),
                message: "pool name cannot be empty".into(),
            });
        }

        Ok(Self {
            name,
            worker_count,
            capacity,
        })
    }

    /// Get worker count.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count.get()
    }

    /// Get queue capacity.
    #[inline]
    pub fn capacity(&self) -> QueueCapacity {
        self.capacity
    }

    /// A builder preloaded with this configuration.
    pub fn builder(&self) -> PoolBuilder {
        WorkerPool::builder()
            .name(self.name.clone())
            .workers(self.worker_count())
            .capacity(self.capacity)
    }
}

/// Parse `POOL_WORKERS`; `0` resolves to the CPU count.
fn parse_worker_count(raw: &str) -> Result<NonZeroUsize, ConfigError> {
    let workers: usize = raw.trim().parse().map_err(|e| ConfigError::Parse {
        key: "POOL_WORKERS".into(),
        value: raw.to_string(),
        error: format!("{e}"),
    })?;

    let count = if workers == 0 {
        num_cpus::get()
    } else {
        workers
    };

    NonZeroUsize::new(count).ok_or_else(|| ConfigError::Invalid {
        key: "POOL_WORKERS".into(),
        message: "worker count cannot be zero".into(),
    })
}

/// Parse `POOL_QUEUE_CAPACITY`: `auto`, `unbounded`, or a number (`0` = hand-off).
fn parse_queue_capacity(raw: &str, workers: NonZeroUsize) -> Result<QueueCapacity, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "" | "auto" => Ok(QueueCapacity::Bounded(
            workers.get().saturating_mul(DEFAULT_QUEUE_MULTIPLIER),
        )),
        "unbounded" => Ok(QueueCapacity::Unbounded),
        value => value
            .parse()
            .map(QueueCapacity::Bounded)
            .map_err(|e| ConfigError::Parse {
                key: "POOL_QUEUE_CAPACITY".into(),
                value: raw.to_string(),
                error: format!("{e}"),
            }),
    }
}
