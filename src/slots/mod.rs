//! Fixed-size pool of reusable resources.
//!
//! A [`SlotPool`] owns N resources for its whole lifetime. `acquire` hands out
//! a [`SlotHandle`] for a free slot, `release` gives it back. Slots are never
//! created or destroyed after construction; only their free/in-use bit flips.
//!
//! By default a miss returns `None` immediately. [`AcquireMode::Blocking`]
//! makes `acquire` wait for a release instead.
//!
//! ```rust,no_run
//! use bounded_pool::slots::SlotPool;
//!
//! let pool = SlotPool::with_factory(3, |i| format!("conn-{i}"))?;
//! let handle = pool.acquire().expect("slot available");
//! pool.with_resource(&handle, |conn| println!("using {conn}"))?;
//! pool.release(handle)?;
//! # Ok::<(), bounded_pool::slots::SlotError>(())
//! ```

mod bitset;
mod error;

pub use error::{HandleFault, SlotError, SlotResult};

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use self::bitset::SlotBitSet;
use crate::observability::Metrics;

/// What `acquire` does when every slot is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquireMode {
    /// Return `None` right away.
    #[default]
    Immediate,
    /// Wait for a release, up to `timeout` (`None` waits forever).
    Blocking { timeout: Option<Duration> },
}

impl fmt::Display for AcquireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireMode::Immediate => f.write_str("immediate"),
            AcquireMode::Blocking { timeout: None } => f.write_str("blocking"),
            AcquireMode::Blocking {
                timeout: Some(timeout),
            } => write!(f, "blocking ({:?})", timeout),
        }
    }
}

/// Proof of holding one slot.
///
/// Copyable so it can be passed around freely; the generation makes any copy
/// useless once the slot has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pool: Uuid,
    index: usize,
    generation: u64,
}

impl SlotHandle {
    /// Position of the slot in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Release count of the slot when this handle was issued.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct SlotState {
    free: SlotBitSet,
    generations: Vec<u64>,
}

/// Fixed set of reusable resources with acquire/release.
pub struct SlotPool<T> {
    id: Uuid,
    name: String,
    mode: AcquireMode,
    resources: Vec<Mutex<T>>,
    state: Mutex<SlotState>,
    released: Condvar,
    metrics: Option<Arc<Metrics>>,
}

impl<T> SlotPool<T> {
    /// Build a pool over `resources`. Fails if the list is empty.
    pub fn new(resources: Vec<T>) -> SlotResult<Self> {
        if resources.is_empty() {
            return Err(SlotError::InvalidConfig(
                "slot pool needs at least one resource".into(),
            ));
        }

        let len = resources.len();
        Ok(Self {
            id: Uuid::new_v4(),
            name: "slots".into(),
            mode: AcquireMode::default(),
            resources: resources.into_iter().map(Mutex::new).collect(),
            state: Mutex::new(SlotState {
                free: SlotBitSet::all_free(len),
                generations: vec![0; len],
            }),
            released: Condvar::new(),
            metrics: None,
        })
    }

    /// Build `size` resources with `factory(index)`.
    pub fn with_factory<F>(size: usize, factory: F) -> SlotResult<Self>
    where
        F: FnMut(usize) -> T,
    {
        Self::new((0..size).map(factory).collect())
    }

    /// Set the behavior of [`acquire`](Self::acquire) on a miss.
    pub fn with_mode(mut self, mode: AcquireMode) -> Self {
        self.mode = mode;
        self
    }

    /// Name used in logs and metric labels.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Record acquire outcomes and occupancy into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.update_slots(&self.name, 0, self.capacity());
        self.metrics = Some(metrics);
        self
    }

    /// Acquire a free slot according to the configured [`AcquireMode`].
    pub fn acquire(&self) -> Option<SlotHandle> {
        match self.mode {
            AcquireMode::Immediate => self.try_acquire(),
            AcquireMode::Blocking { timeout } => self.acquire_blocking(timeout),
        }
    }

    /// Acquire a free slot, returning `None` at once if all are in use.
    pub fn try_acquire(&self) -> Option<SlotHandle> {
        let mut state = self.lock_state();
        let handle = self.take(&mut state);
        let in_use = self.capacity() - state.free.free_count();
        drop(state);

        self.record(if handle.is_some() { "hit" } else { "miss" }, in_use);
        handle
    }

    /// Acquire a free slot, waiting up to `timeout` for one to be released.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<SlotHandle> {
        self.acquire_blocking(Some(timeout))
    }

    fn acquire_blocking(&self, timeout: Option<Duration>) -> Option<SlotHandle> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock_state();

        loop {
            if let Some(handle) = self.take(&mut state) {
                let in_use = self.capacity() - state.free.free_count();
                drop(state);
                self.record("hit", in_use);
                return Some(handle);
            }

            state = match deadline {
                None => self
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let in_use = self.capacity() - state.free.free_count();
                        drop(state);
                        debug!(pool = %self.name, "slot acquire timed out");
                        self.record("timeout", in_use);
                        return None;
                    }
                    self.released
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Return a held slot to the pool and wake one waiting acquirer.
    ///
    /// Waits for any [`with_resource`](Self::with_resource) call on the slot
    /// to finish, so it must not be called from inside one.
    pub fn release(&self, handle: SlotHandle) -> SlotResult<()> {
        // Resource before state, same order as `with_resource`.
        let resource = self.lock_resource(&handle);
        let mut state = self.lock_state();
        if let Err(e) = self.check(&state, &handle) {
            drop(state);
            drop(resource);
            warn!(pool = %self.name, slot = handle.index, error = %e, "rejected slot release");
            return Err(e);
        }

        state.generations[handle.index] += 1;
        state.free.set_free(handle.index);
        let in_use = self.capacity() - state.free.free_count();
        drop(state);
        drop(resource);

        self.released.notify_one();
        debug!(pool = %self.name, slot = handle.index, "slot released");
        if let Some(metrics) = &self.metrics {
            metrics.update_slots(&self.name, in_use, self.capacity());
        }
        Ok(())
    }

    /// Run `f` with exclusive access to the resource behind a held handle.
    ///
    /// The handle is checked after the resource lock is taken, so a copy of
    /// a handle whose slot was released in the meantime is rejected.
    pub fn with_resource<F, R>(&self, handle: &SlotHandle, f: F) -> SlotResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let resource = self.lock_resource(handle);
        self.check(&self.lock_state(), handle)?;
        match resource {
            Some(mut resource) => Ok(f(&mut resource)),
            None => Err(SlotError::InvalidHandle {
                index: handle.index,
                fault: HandleFault::OutOfRange,
            }),
        }
    }

    /// Whether `handle` currently holds its slot.
    pub fn is_held(&self, handle: &SlotHandle) -> bool {
        self.check(&self.lock_state(), handle).is_ok()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.resources.len()
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.lock_state().free.free_count()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured acquire mode.
    pub fn mode(&self) -> AcquireMode {
        self.mode
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, state: &mut SlotState) -> Option<SlotHandle> {
        let index = state.free.take_first_free()?;
        debug!(pool = %self.name, slot = index, "slot acquired");
        Some(SlotHandle {
            pool: self.id,
            index,
            generation: state.generations[index],
        })
    }

    /// Lock the resource behind `handle` if it names a slot of this pool.
    fn lock_resource(&self, handle: &SlotHandle) -> Option<MutexGuard<'_, T>> {
        if handle.pool != self.id {
            return None;
        }
        self.resources
            .get(handle.index)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn check(&self, state: &SlotState, handle: &SlotHandle) -> SlotResult<()> {
        let fault = if handle.pool != self.id {
            HandleFault::Foreign
        } else if handle.index >= state.free.len() {
            HandleFault::OutOfRange
        } else if state.free.is_free(handle.index) {
            HandleFault::NotInUse
        } else if state.generations[handle.index] != handle.generation {
            HandleFault::Stale
        } else {
            return Ok(());
        };
        Err(SlotError::InvalidHandle {
            index: handle.index,
            fault,
        })
    }

    fn record(&self, outcome: &str, in_use: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_acquire(&self.name, outcome);
            metrics.update_slots(&self.name, in_use, self.capacity());
        }
    }
}

impl<T> fmt::Debug for SlotPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}
