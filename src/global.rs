//! Process-wide worker pool.
//!
//! The global pool has an explicit lifecycle: [`init`] once at startup,
//! [`pool`] or [`submit`] anywhere, [`teardown`] at exit. Once torn down it
//! stays closed; later calls report [`PoolError::Closed`].

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::pool::{PoolBuilder, PoolError, PoolResult, WorkerPool};

enum GlobalState {
    Uninitialized,
    Active(Arc<WorkerPool>),
    TornDown,
}

static GLOBAL: RwLock<GlobalState> = RwLock::new(GlobalState::Uninitialized);

/// Build and install the global pool.
///
/// Fails with [`PoolError::AlreadyInitialized`] if a pool was installed
/// before, even one that has since been torn down.
pub fn init(builder: PoolBuilder) -> PoolResult<Arc<WorkerPool>> {
    let mut state = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    if !matches!(*state, GlobalState::Uninitialized) {
        return Err(PoolError::AlreadyInitialized);
    }

    let pool = Arc::new(builder.build()?);
    info!(
        pool = %pool.name(),
        workers = pool.worker_count(),
        capacity = %pool.queue_capacity(),
        "global worker pool initialized"
    );
    *state = GlobalState::Active(Arc::clone(&pool));
    Ok(pool)
}

/// Get the global pool.
pub fn pool() -> PoolResult<Arc<WorkerPool>> {
    match &*GLOBAL.read().unwrap_or_else(PoisonError::into_inner) {
        GlobalState::Active(pool) => Ok(Arc::clone(pool)),
        GlobalState::Uninitialized => Err(PoolError::NotInitialized),
        GlobalState::TornDown => Err(PoolError::Closed),
    }
}

/// Submit a fire-and-forget task to the global pool.
pub fn submit<F>(f: F) -> PoolResult<()>
where
    F: FnOnce() + Send + 'static,
{
    pool()?.submit(f)
}

/// Whether a global pool is currently installed and not torn down.
pub fn is_initialized() -> bool {
    matches!(
        *GLOBAL.read().unwrap_or_else(PoisonError::into_inner),
        GlobalState::Active(_)
    )
}

/// Shut the global pool down and wait for its workers.
///
/// Returns `false` if there was no active pool to tear down.
pub fn teardown(graceful: bool) -> bool {
    let previous = {
        let mut state = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, GlobalState::TornDown) {
            GlobalState::Active(pool) => Some(pool),
            GlobalState::Uninitialized => {
                *state = GlobalState::Uninitialized;
                None
            }
            GlobalState::TornDown => None,
        }
    };

    match previous {
        Some(pool) => {
            info!(pool = %pool.name(), graceful, "tearing down global worker pool");
            pool.shutdown(graceful);
            true
        }
        None => false,
    }
}
