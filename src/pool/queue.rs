//! Shared task queue.
//!
//! A crossbeam MPMC channel plus two close signals. Closing happens in two
//! phases: `close_intake` rejects new submissions and waits for in-flight
//! ones, then `signal_drain` tells idle workers to stop waiting. Once the
//! drain signal is out nothing else can be enqueued, so an empty queue seen
//! by a draining worker is final.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Instant;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};

use super::error::{PoolError, PoolResult};
use super::task::Task;

/// Capacity of the task queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueCapacity {
    /// At most `n` pending tasks. `0` means synchronous hand-off: a
    /// submission completes only when a worker takes the task.
    Bounded(usize),
    /// No limit on pending tasks.
    Unbounded,
}

impl QueueCapacity {
    /// Maximum number of pending tasks, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            QueueCapacity::Bounded(n) => Some(*n),
            QueueCapacity::Unbounded => None,
        }
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueCapacity::Bounded(0) => write!(f, "0 (hand-off)"),
            QueueCapacity::Bounded(n) => write!(f, "{}", n),
            QueueCapacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A queued task with its enqueue time.
pub(crate) struct Envelope {
    pub task: Task,
    pub enqueued_at: Instant,
}

impl Envelope {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            enqueued_at: Instant::now(),
        }
    }
}

/// Outcome of a blocking dequeue.
pub(crate) enum Pop {
    Task(Envelope),
    Shutdown,
}

pub(crate) struct TaskQueue {
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
    capacity: QueueCapacity,
    closed: AtomicBool,
    /// Read-held by every submission, write-acquired once by `close_intake`.
    admission: RwLock<()>,
    /// Dropped to wake submitters blocked on a full queue.
    intake_tx: Mutex<Option<Sender<()>>>,
    intake_rx: Receiver<()>,
    /// Dropped to wake idle workers.
    drain_tx: Mutex<Option<Sender<()>>>,
    drain_rx: Receiver<()>,
}

impl TaskQueue {
    pub fn new(capacity: QueueCapacity) -> Self {
        let (sender, receiver) = match capacity {
            QueueCapacity::Bounded(n) => bounded(n),
            QueueCapacity::Unbounded => unbounded(),
        };
        let (intake_tx, intake_rx) = bounded(0);
        let (drain_tx, drain_rx) = bounded(0);

        Self {
            sender,
            receiver,
            capacity,
            closed: AtomicBool::new(false),
            admission: RwLock::new(()),
            intake_tx: Mutex::new(Some(intake_tx)),
            intake_rx,
            drain_tx: Mutex::new(Some(drain_tx)),
            drain_rx,
        }
    }

    pub fn capacity(&self) -> QueueCapacity {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Enqueue, blocking while the queue is full.
    pub fn push(&self, envelope: Envelope) -> PoolResult<()> {
        let _admitted = self.admission.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        select! {
            send(self.sender, envelope) -> res => res.map_err(|_| PoolError::Closed),
            recv(self.intake_rx) -> _ => Err(PoolError::Closed),
        }
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, envelope: Envelope) -> PoolResult<()> {
        let _admitted = self.admission.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        match self.sender.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PoolError::Saturated {
                capacity: self.capacity.limit().unwrap_or(0),
            }),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Closed),
        }
    }

    /// Dequeue, blocking until a task arrives or the drain signal fires.
    pub fn pop(&self) -> Pop {
        select! {
            recv(self.receiver) -> msg => match msg {
                Ok(envelope) => Pop::Task(envelope),
                Err(_) => Pop::Shutdown,
            },
            recv(self.drain_rx) -> _ => Pop::Shutdown,
        }
    }

    pub fn try_pop(&self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }

    /// Stop accepting submissions. Returns `false` if intake was already closed.
    pub fn close_intake(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.intake_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Wait out submissions that passed the closed check before the swap.
        drop(self.admission.write().unwrap_or_else(PoisonError::into_inner));
        true
    }

    pub fn signal_drain(&self) {
        self.drain_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Remove everything still queued.
    pub fn drain_remaining(&self) -> Vec<Envelope> {
        self.receiver.try_iter().collect()
    }
}
