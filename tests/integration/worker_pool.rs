//! Task execution: exactly-once, ordering, saturation, failure isolation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bounded_pool::pool::{FailureKind, PoolError, Task, WorkerPool, WorkerState};

use crate::helpers::*;

/// Ten increments on three workers
#[test]
fn test_counter_on_three_workers() {
    let pool = pool(3, 100);
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown(true);
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert_eq!(pool.stats().completed, 10);
}

/// Every task runs exactly once
#[test]
fn test_each_task_runs_once() {
    let pool = pool(4, 8);
    let seen = Arc::new(Mutex::new(Vec::new()));

    for id in 0..500 {
        let seen = Arc::clone(&seen);
        pool.submit(move || seen.lock().unwrap().push(id)).unwrap();
    }
    pool.shutdown(true);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 500);
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 500);
}

/// Single worker sees tasks in submission order
#[test]
fn test_fifo_order() {
    let gate = Gate::new();
    let pool = pool(1, 16);
    let order = Arc::new(Mutex::new(Vec::new()));

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    for id in 0..10 {
        let order = Arc::clone(&order);
        pool.submit(move || order.lock().unwrap().push(id)).unwrap();
    }
    assert_eq!(pool.pending_count(), 10);
    gate.open_one();

    pool.shutdown(true);
    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

/// Non-blocking submission fails fast on a full queue
#[test]
fn test_try_submit_saturated() {
    let gate = Gate::new();
    let pool = pool(1, 2);

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    pool.try_submit(|| {}).unwrap();
    pool.try_submit(|| {}).unwrap();

    let err = pool.try_submit(|| {}).unwrap_err();
    assert_eq!(err, PoolError::Saturated { capacity: 2 });
    assert!(err.is_saturated());
    assert_eq!(pool.stats().rejected, 1);

    gate.open_one();
    pool.shutdown(true);
    assert_eq!(pool.stats().completed, 3);
}

/// Zero capacity hands tasks straight to an idle worker
#[test]
fn test_hand_off_queue() {
    let gate = Gate::new();
    let pool = pool(1, 0);

    // Blocking submit waits for the worker to take the task.
    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();

    let err = pool.try_submit(|| {}).unwrap_err();
    assert_eq!(err, PoolError::Saturated { capacity: 0 });

    gate.open_one();
    pool.shutdown(true);
}

/// Blocking submit waits for room instead of failing
#[test]
fn test_submit_blocks_until_room() {
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
    assert!(!submitter.is_finished());

    gate.open_one();
    submitter.join().unwrap().unwrap();
    pool.shutdown(true);
    assert_eq!(pool.stats().completed, 3);
}

/// A panicking task is reported and the worker keeps going
#[test]
fn test_panic_isolated() {
    let recorder = Recorder::default();
    let pool = recorder
        .install(WorkerPool::builder().workers(1).name("iso"))
        .build()
        .unwrap();

    pool.submit_task(Task::new(|| panic!("boom")).named("explode"))
        .unwrap();
    let after = pool.submit_with_result(|| "still alive").unwrap();
    assert_eq!(after.join().unwrap(), "still alive");

    pool.shutdown(true);
    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task.as_deref(), Some("explode"));
    assert_eq!(failures[0].kind, FailureKind::Panicked("boom".into()));
    assert_eq!(pool.stats().panicked, 1);
    assert_eq!(pool.worker_states(), vec![WorkerState::Terminated]);
}

/// Result handle carries a panic back to the caller
#[test]
fn test_result_handle_panic() {
    let pool = pool(2, 4);
    let handle = pool
        .submit_with_result(|| -> u32 { panic!("bad input") })
        .unwrap();

    let err = handle.join().unwrap_err();
    assert_eq!(err, PoolError::TaskPanicked("bad input".into()));
    assert!(err.is_task_failure());
    pool.shutdown(true);
}

/// Task whose deadline passes in the queue never runs
#[test]
fn test_deadline_expires_in_queue() {
    let gate = Gate::new();
    let recorder = Recorder::default();
    let pool = recorder
        .install(WorkerPool::builder().workers(1).queue_capacity(4))
        .build()
        .unwrap();

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();

    let ran = Arc::new(AtomicUsize::new(0));
    let task_ran = Arc::clone(&ran);
    let (task, handle) = Task::with_result(move || {
        task_ran.fetch_add(1, Ordering::SeqCst);
    });
    pool.submit_task(task.named("late").with_timeout(Duration::from_millis(20)))
        .unwrap();

    thread::sleep(Duration::from_millis(60));
    gate.open_one();

    assert_eq!(handle.join().unwrap_err(), PoolError::Expired);
    pool.shutdown(true);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.stats().expired, 1);
    assert_eq!(recorder.failures()[0].kind, FailureKind::Expired);
}

/// Worker states reflect activity
#[test]
fn test_worker_states() {
    let gate = Gate::new();
    let pool = pool(2, 4);

    pool.submit(gate.blocker()).unwrap();
    gate.wait_started();
    assert!(wait_until(|| pool.busy_count() == 1));

    let states = pool.worker_states();
    assert_eq!(
        states.iter().filter(|s| **s == WorkerState::Executing).count(),
        1
    );
    assert_eq!(states.iter().filter(|s| **s == WorkerState::Idle).count(), 1);

    gate.open_one();
    pool.shutdown(true);
}

/// Results can be awaited from async code
#[tokio::test]
async fn test_async_results() {
    let pool = pool(3, 16);

    let handles: Vec<_> = (1..=5u64)
        .map(|n| pool.submit_with_result(move || n * n).unwrap())
        .collect();
    let results = futures_util::future::join_all(handles.into_iter().map(|h| h.wait())).await;
    let total: u64 = results.into_iter().map(Result::unwrap).sum();
    assert_eq!(total, 55);

    let slow = pool
        .submit_with_result(|| thread::sleep(Duration::from_millis(200)))
        .unwrap();
    let err = slow.wait_timeout(Duration::from_millis(10)).await.unwrap_err();
    assert!(err.is_timeout());

    // Shutdown joins threads; keep it off the runtime thread.
    tokio::task::spawn_blocking(move || pool.shutdown(true))
        .await
        .unwrap();
}
