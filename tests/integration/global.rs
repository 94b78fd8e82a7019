//! Process-wide pool lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bounded_pool::global;
use bounded_pool::pool::{PoolError, WorkerPool};

/// Full lifecycle in one test: the global pool is process state.
#[test]
fn test_global_lifecycle() {
    assert!(!global::is_initialized());
    assert_eq!(global::pool().unwrap_err(), PoolError::NotInitialized);
    assert_eq!(global::submit(|| {}).unwrap_err(), PoolError::NotInitialized);
    assert!(!global::teardown(true));

    let pool = global::init(WorkerPool::builder().workers(2).name("global")).unwrap();
    assert!(global::is_initialized());
    assert_eq!(pool.name(), "global");

    let err = global::init(WorkerPool::builder().workers(1)).unwrap_err();
    assert_eq!(err, PoolError::AlreadyInitialized);

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        global::submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    assert!(global::teardown(true));
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert!(pool.is_terminated());

    assert!(!global::is_initialized());
    assert_eq!(global::pool().unwrap_err(), PoolError::Closed);
    assert_eq!(global::submit(|| {}).unwrap_err(), PoolError::Closed);
    assert!(!global::teardown(true));
    assert_eq!(
        global::init(WorkerPool::builder().workers(1)).unwrap_err(),
        PoolError::AlreadyInitialized
    );
}
