//! Test helpers and utilities

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bounded_pool::pool::{PoolBuilder, TaskFailure, WorkerPool};
use crossbeam_channel::{bounded, Receiver, Sender};

/// A latch a task can block on until the test opens it.
pub struct Gate {
    open: Sender<()>,
    wait: Receiver<()>,
    started_tx: Sender<()>,
    started_rx: Receiver<()>,
}

#[allow(dead_code)]
impl Gate {
    pub fn new() -> Self {
        let (open, wait) = bounded(0);
        let (started_tx, started_rx) = bounded(16);
        Self {
            open,
            wait,
            started_tx,
            started_rx,
        }
    }

    /// A task that reports it started, then blocks until the gate opens.
    pub fn blocker(&self) -> impl FnOnce() + Send + 'static {
        let wait = self.wait.clone();
        let started = self.started_tx.clone();
        move || {
            let _ = started.send(());
            let _ = wait.recv();
        }
    }

    /// Wait until a blocker task is running on a worker.
    pub fn wait_started(&self) {
        self.started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("blocker task never started");
    }

    /// Release one blocked task.
    pub fn open_one(&self) {
        self.open
            .send_timeout((), Duration::from_secs(5))
            .expect("no blocked task to release");
    }
}

/// Error hook that records every failure it sees.
#[derive(Clone, Default)]
pub struct Recorder {
    failures: Arc<Mutex<Vec<TaskFailure>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn install(&self, builder: PoolBuilder) -> PoolBuilder {
        let failures = Arc::clone(&self.failures);
        builder.error_hook(move |failure| failures.lock().unwrap().push(failure.clone()))
    }

    pub fn failures(&self) -> Vec<TaskFailure> {
        self.failures.lock().unwrap().clone()
    }
}

/// Small pool with an explicit worker count and queue capacity.
pub fn pool(workers: usize, capacity: usize) -> WorkerPool {
    WorkerPool::builder()
        .workers(workers)
        .queue_capacity(capacity)
        .name("it")
        .build()
        .expect("pool should build")
}

/// Poll `cond` until it holds or five seconds pass.
#[allow(dead_code)]
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
