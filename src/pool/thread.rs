//! Fixed-size worker pool.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::error::{PoolError, PoolResult};
use super::queue::{Envelope, QueueCapacity, TaskQueue};
use super::task::{log_failure, ErrorHook, Task, TaskFailure, TaskHandle};
use super::worker::{self, Shared, ShutdownMode, WorkerState};
use super::{PoolState, PoolStats};
use crate::observability::Metrics;

/// Default queue capacity multiplier per worker.
pub const DEFAULT_QUEUE_MULTIPLIER: usize = 100;

/// Builder for a [`WorkerPool`].
pub struct PoolBuilder {
    workers: usize,
    capacity: Option<QueueCapacity>,
    name: String,
    hook: Option<ErrorHook>,
    metrics: Option<Arc<Metrics>>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            capacity: None,
            name: "worker".to_string(),
            hook: None,
            metrics: None,
        }
    }
}

impl PoolBuilder {
    /// Number of worker threads. Must be at least 1.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bounded queue holding at most `capacity` pending tasks (0 = hand-off).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(QueueCapacity::Bounded(capacity));
        self
    }

    /// Queue without a capacity limit.
    pub fn unbounded(mut self) -> Self {
        self.capacity = Some(QueueCapacity::Unbounded);
        self
    }

    /// Queue capacity as a [`QueueCapacity`] value.
    pub fn capacity(mut self, capacity: QueueCapacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Pool name, used as the worker thread name prefix and in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Callback for task-level failures. Defaults to [`log_failure`].
    pub fn error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Record pool metrics into `metrics`.
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Explicit capacity, or `workers * DEFAULT_QUEUE_MULTIPLIER` (saturating).
    pub(crate) fn resolved_capacity(&self) -> QueueCapacity {
        self.capacity.unwrap_or(QueueCapacity::Bounded(
            self.workers.saturating_mul(DEFAULT_QUEUE_MULTIPLIER),
        ))
    }

    /// Validate the configuration and start the workers.
    pub fn build(self) -> PoolResult<WorkerPool> {
        if self.workers == 0 {
            return Err(PoolError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        if self.name.is_empty() || self.name.contains('\0') {
            return Err(PoolError::InvalidConfig(
                "pool name must be non-empty and free of NUL bytes".into(),
            ));
        }

        let capacity = self.resolved_capacity();
        let hook = self.hook.unwrap_or_else(|| Arc::new(log_failure));

        WorkerPool::start(self.name, self.workers, capacity, hook, self.metrics)
    }
}

/// A fixed set of worker threads consuming tasks from one shared queue.
///
/// Every accepted task runs exactly once on exactly one worker unless the
/// pool is shut down non-gracefully first. Dropping the pool performs a
/// graceful shutdown.
pub struct WorkerPool {
    shared: Arc<Shared>,
    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Number of workers.
    worker_count: usize,
}

impl WorkerPool {
    /// Create a pool with `num_workers` workers and a queue of
    /// `num_workers * DEFAULT_QUEUE_MULTIPLIER` slots.
    pub fn new(num_workers: usize, name: impl Into<String>) -> PoolResult<Self> {
        Self::builder().workers(num_workers).name(name).build()
    }

    /// Create a pool with an explicit queue capacity.
    pub fn with_capacity(
        num_workers: usize,
        capacity: QueueCapacity,
        name: impl Into<String>,
    ) -> PoolResult<Self> {
        Self::builder()
            .workers(num_workers)
            .capacity(capacity)
            .name(name)
            .build()
    }

    /// Get a builder for a customized pool.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    fn start(
        name: String,
        num_workers: usize,
        capacity: QueueCapacity,
        hook: ErrorHook,
        metrics: Option<Arc<Metrics>>,
    ) -> PoolResult<Self> {
        let queue = TaskQueue::new(capacity);
        let shared = Arc::new(Shared::new(
            name.clone(),
            queue,
            num_workers,
            hook,
            metrics.clone(),
        ));

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            match worker::spawn(id, Arc::clone(&shared)) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!(pool = %name, worker = id, error = %e, "failed to spawn worker");
                    shared.begin_shutdown(ShutdownMode::Immediate);
                    shared.queue.close_intake();
                    shared.queue.signal_drain();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(e.to_string()));
                }
            }
        }

        if let Some(metrics) = &metrics {
            metrics.set_pool_info(&name, num_workers, capacity.limit());
        }

        tracing::info!(
            pool = %name,
            workers = num_workers,
            capacity = %capacity,
            "worker pool created"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_count: num_workers,
        })
    }

    /// Submit a closure, blocking while the queue is full.
    pub fn submit<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Task::new(f), true)
    }

    /// Submit a closure without blocking; fails with [`PoolError::Saturated`]
    /// when the queue is full.
    pub fn try_submit<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Task::new(f), false)
    }

    /// Submit a prepared [`Task`], blocking while the queue is full.
    pub fn submit_task(&self, task: Task) -> PoolResult<()> {
        self.enqueue(task, true)
    }

    /// Submit a prepared [`Task`] without blocking.
    pub fn try_submit_task(&self, task: Task) -> PoolResult<()> {
        self.enqueue(task, false)
    }

    /// Submit a closure whose return value is delivered through a [`TaskHandle`].
    pub fn submit_with_result<F, T>(&self, f: F) -> PoolResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = Task::with_result(f);
        self.enqueue(task, true)?;
        Ok(handle)
    }

    /// Non-blocking variant of [`submit_with_result`](Self::submit_with_result).
    pub fn try_submit_with_result<F, T>(&self, f: F) -> PoolResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = Task::with_result(f);
        self.enqueue(task, false)?;
        Ok(handle)
    }

    fn enqueue(&self, task: Task, blocking: bool) -> PoolResult<()> {
        let result = task.validate().and_then(|()| {
            let envelope = Envelope::new(task);
            if blocking {
                self.shared.queue.push(envelope)
            } else {
                self.shared.queue.try_push(envelope)
            }
        });

        match &result {
            Ok(()) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.shared.metrics {
                    metrics.record_submitted(&self.shared.name);
                    metrics.update_queue_depth(&self.shared.name, self.shared.queue.len());
                }
            }
            Err(e) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                if let Some(metrics) = &self.shared.metrics {
                    metrics.record_rejected(&self.shared.name, e.message());
                }
                tracing::debug!(pool = %self.shared.name, error = %e, "submission rejected");
            }
        }
        result
    }

    /// Shut the pool down and wait for every worker to terminate.
    ///
    /// With `graceful` set, queued tasks run before the workers exit;
    /// otherwise workers finish only the task in hand and the rest of the
    /// queue is discarded. A second call does not change the mode and just
    /// waits for termination.
    pub fn shutdown(&self, graceful: bool) {
        self.initiate_shutdown(graceful);

        if self.is_worker_thread() {
            tracing::warn!(
                pool = %self.shared.name,
                "shutdown called from a pool worker; not waiting for termination"
            );
            return;
        }

        self.await_termination(None);
        self.join_workers();
    }

    /// Begin shutdown without waiting for the workers.
    ///
    /// Returns `false` if shutdown had already been initiated.
    pub fn initiate_shutdown(&self, graceful: bool) -> bool {
        let mode = if graceful {
            ShutdownMode::Graceful
        } else {
            ShutdownMode::Immediate
        };
        if !self.shared.begin_shutdown(mode) {
            return false;
        }

        tracing::info!(
            pool = %self.shared.name,
            graceful,
            pending = self.pending_count(),
            "shutting down worker pool"
        );

        self.shared.queue.close_intake();
        self.shared.queue.signal_drain();
        true
    }

    /// Wait until every worker has terminated, or until `timeout` passes.
    ///
    /// Returns `true` if the pool is fully terminated.
    pub fn await_termination(&self, timeout: Option<Duration>) -> bool {
        let done = self.shared.wait_terminated(timeout);
        if done {
            tracing::debug!(pool = %self.shared.name, "worker pool terminated");
        }
        done
    }

    fn join_workers(&self) {
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!(pool = %self.shared.name, "worker thread panicked");
            }
        }
    }

    fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|handle| handle.thread().id() == current)
    }

    /// Get the pool name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Get the number of workers.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Get the queue capacity.
    pub fn queue_capacity(&self) -> QueueCapacity {
        self.shared.queue.capacity()
    }

    /// Number of tasks waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Number of workers currently running a task.
    pub fn busy_count(&self) -> usize {
        self.shared.busy.load(Ordering::SeqCst)
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.shared.mode() != ShutdownMode::Running
    }

    /// Whether every worker has terminated.
    pub fn is_terminated(&self) -> bool {
        self.shared.live_workers() == 0
    }

    /// Current state of each worker, indexed by worker id.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.shared.worker_states()
    }

    /// Snapshot of pool counters.
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        let state = if self.is_terminated() {
            PoolState::Terminated
        } else if self.is_shutdown() {
            PoolState::ShuttingDown
        } else {
            PoolState::Running
        };

        PoolStats {
            name: self.shared.name.clone(),
            state,
            workers: self.worker_count,
            queue_capacity: self.shared.queue.capacity().limit(),
            pending: self.pending_count(),
            busy: self.busy_count(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            expired: counters.expired.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            discarded: counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("workers", &self.worker_count)
            .field("capacity", &self.shared.queue.capacity())
            .field("state", &self.stats().state)
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}
