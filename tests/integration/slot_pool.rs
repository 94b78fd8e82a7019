//! Slot pool acquire/release under contention.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bounded_pool::slots::{AcquireMode, HandleFault, SlotError, SlotPool};

/// Three slots: fourth acquire misses, release frees one
#[test]
fn test_three_slot_scenario() {
    let pool = SlotPool::with_factory(3, |i| format!("conn-{i}")).unwrap();

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    let c = pool.acquire().unwrap();
    let indexes: HashSet<_> = [a, b, c].iter().map(|h| h.index()).collect();
    assert_eq!(indexes.len(), 3);

    assert!(pool.acquire().is_none());

    pool.release(b).unwrap();
    let d = pool.acquire().unwrap();
    assert_ne!(d.index(), a.index());
    assert_ne!(d.index(), c.index());

    let name = pool.with_resource(&d, |conn| conn.clone()).unwrap();
    assert_eq!(name, format!("conn-{}", d.index()));
}

/// Releasing twice is rejected
#[test]
fn test_double_release_rejected() {
    let pool = SlotPool::with_factory(2, |_| ()).unwrap();
    let handle = pool.acquire().unwrap();
    pool.release(handle).unwrap();

    let err = pool.release(handle).unwrap_err();
    assert_eq!(
        err,
        SlotError::InvalidHandle {
            index: handle.index(),
            fault: HandleFault::NotInUse,
        }
    );
    assert_eq!(pool.in_use(), 0);
}

/// Handles from one pool do not work on another
#[test]
fn test_foreign_handle_rejected() {
    let first = SlotPool::with_factory(1, |_| ()).unwrap();
    let second = SlotPool::with_factory(1, |_| ()).unwrap();
    let handle = first.acquire().unwrap();

    assert_eq!(
        second.release(handle).unwrap_err(),
        SlotError::InvalidHandle {
            index: 0,
            fault: HandleFault::Foreign,
        }
    );
}

/// Concurrent holders never exceed capacity and never share a slot
#[test]
fn test_contention_respects_capacity() {
    const SLOTS: usize = 3;
    let pool = Arc::new(
        SlotPool::with_factory(SLOTS, |_| AtomicUsize::new(0))
            .unwrap()
            .with_mode(AcquireMode::Blocking { timeout: None }),
    );
    let holders = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let holders = Arc::clone(&holders);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..50 {
                    let handle = pool.acquire().unwrap();
                    let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);

                    pool.with_resource(&handle, |occupied| {
                        assert_eq!(occupied.fetch_add(1, Ordering::SeqCst), 0);
                        thread::yield_now();
                        occupied.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap();

                    holders.fetch_sub(1, Ordering::SeqCst);
                    pool.release(handle).unwrap();
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= SLOTS);
    assert_eq!(pool.available(), SLOTS);
}

/// Blocking acquire with a timeout gives up
#[test]
fn test_blocking_timeout() {
    let pool = SlotPool::with_factory(1, |_| ())
        .unwrap()
        .with_mode(AcquireMode::Blocking {
            timeout: Some(Duration::from_millis(30)),
        });
    let _held = pool.acquire().unwrap();

    assert!(pool.acquire().is_none());
    assert!(pool.try_acquire().is_none());
}

/// A release hands the slot to a waiting acquirer
#[test]
fn test_release_wakes_waiter() {
    let pool = Arc::new(SlotPool::with_factory(1, |_| ()).unwrap());
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire_timeout(Duration::from_secs(5)))
    };
    thread::sleep(Duration::from_millis(30));
    pool.release(held).unwrap();

    assert!(waiter.join().unwrap().is_some());
}
