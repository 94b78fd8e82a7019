//! Worker execution loop and the state shared between workers and the pool.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, warn};

use super::queue::{Envelope, Pop, TaskQueue};
use super::task::{ErrorHook, FailureKind, TaskFailure};
use crate::observability::Metrics;

/// Lifecycle state of a single worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for a task.
    Idle = 0,
    /// Running a task.
    Executing = 1,
    /// Shutdown signaled; finishing queued work if the shutdown is graceful.
    Draining = 2,
    /// Thread has exited.
    Terminated = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Executing,
            2 => WorkerState::Draining,
            _ => WorkerState::Terminated,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Idle => "idle",
            WorkerState::Executing => "executing",
            WorkerState::Draining => "draining",
            WorkerState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum ShutdownMode {
    Running = 0,
    Graceful = 1,
    Immediate = 2,
}

impl ShutdownMode {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownMode::Running,
            1 => ShutdownMode::Graceful,
            _ => ShutdownMode::Immediate,
        }
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
    pub expired: AtomicU64,
    pub rejected: AtomicU64,
    pub discarded: AtomicU64,
}

/// State shared by the pool handle and all of its workers.
pub(crate) struct Shared {
    pub name: String,
    pub queue: TaskQueue,
    pub counters: Counters,
    pub busy: AtomicUsize,
    mode: AtomicU8,
    states: Box<[AtomicU8]>,
    live: Mutex<usize>,
    terminated: Condvar,
    hook: ErrorHook,
    pub metrics: Option<Arc<Metrics>>,
}

impl Shared {
    pub fn new(
        name: String,
        queue: TaskQueue,
        workers: usize,
        hook: ErrorHook,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            name,
            queue,
            counters: Counters::default(),
            busy: AtomicUsize::new(0),
            mode: AtomicU8::new(ShutdownMode::Running as u8),
            states: (0..workers)
                .map(|_| AtomicU8::new(WorkerState::Idle as u8))
                .collect(),
            live: Mutex::new(0),
            terminated: Condvar::new(),
            hook,
            metrics,
        }
    }

    pub fn mode(&self) -> ShutdownMode {
        ShutdownMode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    /// Move from `Running` to `mode`. Returns `false` if shutdown already began.
    pub fn begin_shutdown(&self, mode: ShutdownMode) -> bool {
        self.mode
            .compare_exchange(
                ShutdownMode::Running as u8,
                mode as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|s| WorkerState::from_u8(s.load(Ordering::SeqCst)))
            .collect()
    }

    fn set_state(&self, id: usize, state: WorkerState) {
        self.states[id].store(state as u8, Ordering::SeqCst);
    }

    pub fn live_workers(&self) -> usize {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until every worker has exited. Returns `false` on timeout.
    pub fn wait_terminated(&self, timeout: Option<Duration>) -> bool {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        match timeout {
            None => {
                let _live = self
                    .terminated
                    .wait_while(live, |n| *n > 0)
                    .unwrap_or_else(PoisonError::into_inner);
                true
            }
            Some(timeout) => {
                let (live, _) = self
                    .terminated
                    .wait_timeout_while(live, timeout, |n| *n > 0)
                    .unwrap_or_else(PoisonError::into_inner);
                *live == 0
            }
        }
    }

    fn worker_exited(&self, id: usize) {
        self.set_state(id, WorkerState::Terminated);
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live -= 1;
        if *live == 0 {
            // Last one out discards whatever a non-graceful shutdown left behind.
            let leftover = self.queue.drain_remaining();
            if !leftover.is_empty() {
                self.discard_all(leftover);
            }
            self.terminated.notify_all();
        }
    }

    /// Drop tasks that will never run; their result slots resolve to `Cancelled`.
    pub fn discard_all(&self, envelopes: Vec<Envelope>) {
        let count = envelopes.len();
        drop(envelopes);
        self.counters
            .discarded
            .fetch_add(count as u64, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_discarded(&self.name, count);
            metrics.update_queue_depth(&self.name, self.queue.len());
        }
        warn!(pool = %self.name, discarded = count, "discarded queued tasks");
    }

    fn report(&self, failure: TaskFailure) {
        let hook = &self.hook;
        if panic::catch_unwind(AssertUnwindSafe(|| hook(&failure))).is_err() {
            error!(pool = %self.name, worker = failure.worker, "error hook panicked");
        }
    }

    fn execute(&self, id: usize, envelope: Envelope) {
        let Envelope { task, enqueued_at } = envelope;
        let started = Instant::now();
        let waited = started.duration_since(enqueued_at);
        let name = task.name().map(str::to_owned);

        if let Some(metrics) = &self.metrics {
            metrics.update_queue_depth(&self.name, self.queue.len());
        }

        if task.is_expired(started) {
            task.expire();
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = &self.metrics {
                metrics.record_task(&self.name, "expired", waited.as_secs_f64(), 0.0);
            }
            self.report(TaskFailure {
                pool: self.name.clone(),
                worker: id,
                task: name,
                kind: FailureKind::Expired,
            });
            return;
        }

        let previous = self.states[id].swap(WorkerState::Executing as u8, Ordering::SeqCst);
        let busy = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(metrics) = &self.metrics {
            metrics.update_busy_workers(&self.name, busy);
        }

        let outcome = task.run();

        let busy = self.busy.fetch_sub(1, Ordering::SeqCst) - 1;
        self.states[id].store(previous, Ordering::SeqCst);
        let elapsed = started.elapsed();

        let label = match &outcome {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                "success"
            }
            Err(_) => {
                self.counters.panicked.fetch_add(1, Ordering::Relaxed);
                "panicked"
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.update_busy_workers(&self.name, busy);
            metrics.record_task(
                &self.name,
                label,
                waited.as_secs_f64(),
                elapsed.as_secs_f64(),
            );
        }

        if let Err(msg) = outcome {
            self.report(TaskFailure {
                pool: self.name.clone(),
                worker: id,
                task: name,
                kind: FailureKind::Panicked(msg),
            });
        }
    }
}

/// Marks the worker terminated however its thread exits.
struct ExitGuard<'a> {
    id: usize,
    shared: &'a Shared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.shared.worker_exited(self.id);
    }
}

/// Spawn worker `id`. The live count is raised before the thread starts.
pub(crate) fn spawn(id: usize, shared: Arc<Shared>) -> io::Result<JoinHandle<()>> {
    *shared.live.lock().unwrap_or_else(PoisonError::into_inner) += 1;

    let thread_name = format!("{}-{}", shared.name, id);
    let worker_shared = Arc::clone(&shared);
    let spawned = thread::Builder::new()
        .name(thread_name)
        .spawn(move || run(id, worker_shared));

    if spawned.is_err() {
        shared.worker_exited(id);
    }
    spawned
}

fn run(id: usize, shared: Arc<Shared>) {
    let _exit = ExitGuard {
        id,
        shared: &shared,
    };
    debug!(pool = %shared.name, worker = id, "worker started");

    loop {
        shared.set_state(id, WorkerState::Idle);
        match shared.queue.pop() {
            Pop::Task(envelope) => {
                if shared.mode() == ShutdownMode::Immediate {
                    let mut batch = vec![envelope];
                    batch.extend(shared.queue.drain_remaining());
                    shared.discard_all(batch);
                    continue;
                }
                shared.execute(id, envelope);
            }
            Pop::Shutdown => break,
        }
    }

    shared.set_state(id, WorkerState::Draining);
    if shared.mode() == ShutdownMode::Graceful {
        while let Some(envelope) = shared.queue.try_pop() {
            shared.execute(id, envelope);
        }
    }

    debug!(pool = %shared.name, worker = id, "worker stopped");
}
