//! Graceful and immediate shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bounded_pool::pool::{PoolError, PoolState, WorkerState};

use crate::helpers::*;

fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> usize + Send + 'static {
    let counter = Arc::clone(counter);
    move || counter.fetch_add(1, Ordering::SeqCst) + 1
}

/// Graceful shutdown runs everything already queued
#[test]
fn test_graceful_drains_queue() {
    let gate = Gate::new();
    let pool = pool(1, 16);
    let counter = Arc::new(AtomicUsize::new(0));

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    let handles: Vec<_> = (0..5)
        .map(|_| pool.submit_with_result(counting(&counter)).unwrap())
        .collect();

    assert!(pool.initiate_shutdown(true));
    assert!(pool.submit(|| {}).unwrap_err().is_closed());
    gate.open_one();

    assert!(pool.await_termination(Some(Duration::from_secs(5))));
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    for handle in handles {
        assert!(handle.join().is_ok());
    }
    assert_eq!(pool.stats().discarded, 0);
}

/// Immediate shutdown finishes only the running task
#[test]
fn test_immediate_discards_queue() {
    let gate = Gate::new();
    let pool = pool(1, 16);
    let counter = Arc::new(AtomicUsize::new(0));

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    let handles: Vec<_> = (0..5)
        .map(|_| pool.submit_with_result(counting(&counter)).unwrap())
        .collect();

    assert!(pool.initiate_shutdown(false));
    gate.open_one();
    assert!(pool.await_termination(Some(Duration::from_secs(5))));

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    for handle in handles {
        assert_eq!(handle.join().unwrap_err(), PoolError::Cancelled);
    }
    let stats = pool.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.discarded, 5);
    assert_eq!(stats.state, PoolState::Terminated);
}

/// Calling shutdown twice is the same as once
#[test]
fn test_shutdown_twice() {
    let pool = pool(2, 8);
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let task = counting(&counter);
        pool.submit(move || {
            task();
        })
        .unwrap();
    }

    pool.shutdown(true);
    let first = pool.stats();
    pool.shutdown(false);
    let second = pool.stats();

    assert_eq!(first, second);
    assert_eq!(counter.load(Ordering::SeqCst), 20);
    assert!(!pool.initiate_shutdown(true));
    assert!(pool
        .worker_states()
        .iter()
        .all(|s| *s == WorkerState::Terminated));
}

/// Submission after shutdown returned is refused and never runs
#[test]
fn test_submit_after_shutdown() {
    let pool = pool(2, 8);
    pool.shutdown(true);

    let counter = Arc::new(AtomicUsize::new(0));
    let task = counting(&counter);
    let err = pool
        .submit(move || {
            task();
        })
        .unwrap_err();
    assert_eq!(err, PoolError::Closed);
    assert_eq!(
        pool.try_submit_with_result(|| 1).unwrap_err(),
        PoolError::Closed
    );

    thread::sleep(Duration::from_millis(20));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(pool.stats().submitted, 0);
}

/// A submitter blocked on a full queue is released by shutdown
#[test]
fn test_blocked_submitter_released() {
    let gate = Gate::new();
    let pool = Arc::new(pool(1, 1));

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    pool.submit(|| {}).unwrap();

    let submitter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(|| {}))
    };
    thread::sleep(Duration::from_millis(50));

    pool.initiate_shutdown(true);
    assert_eq!(submitter.join().unwrap().unwrap_err(), PoolError::Closed);

    gate.open_one();
    pool.shutdown(true);
    assert_eq!(pool.stats().completed, 2);
}

/// await_termination times out while a task is still running
#[test]
fn test_await_termination_timeout() {
    let gate = Gate::new();
    let pool = pool(1, 4);

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    pool.initiate_shutdown(true);

    assert!(!pool.await_termination(Some(Duration::from_millis(30))));
    assert_eq!(pool.stats().state, PoolState::ShuttingDown);

    gate.open_one();
    assert!(pool.await_termination(None));
    assert!(pool.is_terminated());
}

/// Dropping the pool drains it gracefully
#[test]
fn test_drop_is_graceful() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let pool = pool(2, 32);
        for _ in 0..10 {
            let task = counting(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                task();
            })
            .unwrap();
        }
    }
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}
