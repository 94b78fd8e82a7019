//! Tasks, result slots and failure reporting.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::error::{PoolError, PoolResult};

/// Work carried by a task.
///
/// `run` executes the work, `expire` is called instead when the deadline
/// passed while the task sat in the queue. Dropping a job without calling
/// either means the task was discarded.
trait Job: Send {
    fn run(self: Box<Self>);
    fn expire(self: Box<Self>);
}

struct FireAndForget<F>(F);

impl<F> Job for FireAndForget<F>
where
    F: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (self.0)()
    }

    fn expire(self: Box<Self>) {}
}

struct WithResult<F, T> {
    f: F,
    slot: oneshot::Sender<PoolResult<T>>,
}

impl<F, T> Job for WithResult<F, T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    fn run(self: Box<Self>) {
        let WithResult { f, slot } = *self;
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = slot.send(Ok(value));
            }
            Err(payload) => {
                let _ = slot.send(Err(PoolError::TaskPanicked(panic_message(&*payload))));
                // Let the worker observe the panic too so the error hook fires.
                panic::resume_unwind(payload);
            }
        }
    }

    fn expire(self: Box<Self>) {
        let _ = self.slot.send(Err(PoolError::Expired));
    }
}

/// A unit of work submitted to a [`WorkerPool`](super::WorkerPool).
///
/// Tasks are immutable once submitted. An optional name shows up in logs
/// and failure reports; an optional deadline makes the worker skip the task
/// if it is still queued when the deadline passes.
pub struct Task {
    job: Box<dyn Job>,
    name: Option<String>,
    deadline: Option<Instant>,
}

impl Task {
    /// Create a fire-and-forget task.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            job: Box::new(FireAndForget(f)),
            name: None,
            deadline: None,
        }
    }

    /// Create a task with a result slot.
    ///
    /// The returned handle resolves once a worker has run (or skipped) the task.
    pub fn with_result<F, T>(f: F) -> (Self, TaskHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (slot, rx) = oneshot::channel();
        let task = Self {
            job: Box::new(WithResult { f, slot }),
            name: None,
            deadline: None,
        };
        (task, TaskHandle { rx })
    }

    /// Attach a name used in logs and failure reports.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Skip the task if no worker has started it by `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Skip the task if no worker has started it within `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Task name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Task deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reject tasks that can never run.
    pub(crate) fn validate(&self) -> PoolResult<()> {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(PoolError::InvalidTask(
                "deadline already elapsed at submission".into(),
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Run the task, catching panics. Returns the panic message on failure.
    pub(crate) fn run(self) -> Result<(), String> {
        let job = self.job;
        panic::catch_unwind(AssertUnwindSafe(move || job.run()))
            .map_err(|payload| panic_message(&*payload))
    }

    pub(crate) fn expire(self) {
        self.job.expire();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Consumer side of a task's result slot.
///
/// Resolves to the task's value, or to [`PoolError::TaskPanicked`],
/// [`PoolError::Expired`] or [`PoolError::Cancelled`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<PoolResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Block the current thread until the result is available.
    ///
    /// Must not be called from within an async runtime; use [`wait`](Self::wait) there.
    pub fn join(self) -> PoolResult<T> {
        self.rx.blocking_recv().unwrap_or(Err(PoolError::Cancelled))
    }

    /// Wait for the result asynchronously.
    pub async fn wait(self) -> PoolResult<T> {
        self.rx.await.unwrap_or(Err(PoolError::Cancelled))
    }

    /// Wait for the result asynchronously, giving up after `timeout`.
    pub async fn wait_timeout(self, timeout: Duration) -> PoolResult<T> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PoolError::Cancelled),
            Err(_) => Err(PoolError::Timeout(timeout)),
        }
    }

    /// Take the result if it is already available.
    pub fn try_join(&mut self) -> Option<PoolResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(PoolError::Cancelled)),
        }
    }
}

/// Why a task did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The task panicked; carries the panic message.
    Panicked(String),
    /// The deadline elapsed while the task was queued.
    Expired,
}

/// A task-level failure observed by a worker.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Name of the pool.
    pub pool: String,
    /// Index of the worker that observed the failure.
    pub worker: usize,
    /// Task name, if the task had one.
    pub task: Option<String>,
    /// What went wrong.
    pub kind: FailureKind,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.task.as_deref().unwrap_or("<unnamed>");
        match &self.kind {
            FailureKind::Panicked(msg) => write!(
                f,
                "task {} panicked on {}-{}: {}",
                task, self.pool, self.worker, msg
            ),
            FailureKind::Expired => write!(
                f,
                "task {} expired before {}-{} could start it",
                task, self.pool, self.worker
            ),
        }
    }
}

/// Callback invoked by workers for every task-level failure.
pub type ErrorHook = Arc<dyn Fn(&TaskFailure) + Send + Sync>;

/// Default hook: emit an error event.
pub fn log_failure(failure: &TaskFailure) {
    tracing::error!(
        pool = %failure.pool,
        worker = failure.worker,
        task = failure.task.as_deref().unwrap_or(""),
        "{}",
        failure
    );
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
