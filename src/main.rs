use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use bounded_pool::config::Config;
use bounded_pool::observability::Metrics;
use bounded_pool::pool::WorkerPool;
use bounded_pool::slots::SlotPool;
use bounded_pool::{global, logging, VERSION};

/// Stand-in for a network connection held in a slot.
#[derive(Debug)]
struct Connection {
    id: usize,
    queries: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging)?;

    info!("Starting bounded_pool demo {}", VERSION);
    config.log_summary();

    let metrics = Arc::new(Metrics::new()?);

    // Result handles are awaited on a single-threaded runtime; the pools own
    // their own threads.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let counter = counter_demo(&metrics)?;
    info!(counter, "counter demo finished");

    let mut builder = config.pool.builder();
    if config.metrics {
        builder = builder.metrics(Arc::clone(&metrics));
    }
    let pool = global::init(builder)?;

    let handle = pool.submit_with_result(|| (1..=10u64).sum::<u64>())?;
    let sum = runtime.block_on(handle.wait())?;
    info!(sum, "result task finished");

    let mut slots = config
        .slots
        .build(|id| Connection { id, queries: 0 })?
        .with_name("connections");
    if config.metrics {
        slots = slots.with_metrics(Arc::clone(&metrics));
    }
    let slots = Arc::new(slots);

    let users: Vec<_> = (1..=5)
        .map(|user| {
            let slots = Arc::clone(&slots);
            pool.submit_with_result(move || use_connection(&slots, user))
        })
        .collect::<Result<_, _>>()?;
    let served = runtime.block_on(async {
        let mut served = 0;
        for user in users {
            if user.wait().await? {
                served += 1;
            }
        }
        Ok::<_, bounded_pool::PoolError>(served)
    })?;
    info!(served, missed = 5 - served, "connection demo finished");

    global::teardown(true);

    println!("{}", serde_json::to_string_pretty(&pool.stats())?);
    if config.metrics {
        print!("{}", metrics.export());
    }
    Ok(())
}

/// Ten increments of a shared counter spread over three workers.
fn counter_demo(metrics: &Arc<Metrics>) -> Result<usize, bounded_pool::PoolError> {
    let pool = WorkerPool::builder()
        .workers(3)
        .name("counter")
        .metrics(Arc::clone(metrics))
        .build()?;
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })?;
    }

    pool.shutdown(true);
    Ok(counter.load(Ordering::SeqCst))
}

/// Returns whether the user got a connection.
fn use_connection(slots: &SlotPool<Connection>, user: usize) -> bool {
    let Some(handle) = slots.acquire() else {
        warn!(user, "no connection available");
        return false;
    };

    let used = slots.with_resource(&handle, |conn| {
        conn.queries += 1;
        thread::sleep(Duration::from_millis(50));
        info!(user, connection = conn.id, queries = conn.queries, "user query done");
    });
    if let Err(e) = used.and_then(|()| slots.release(handle)) {
        warn!(user, error = %e, "connection handling failed");
    }
    true
}
