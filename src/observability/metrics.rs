//! Prometheus metrics for worker and slot pools.
//!
//! Follows the RED methodology (Rate, Errors, Duration) for task execution,
//! plus saturation gauges for queues, workers and slots. Every series is
//! labelled with the owning pool name so one registry can serve many pools.

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

/// Prometheus metrics registry with all pool metrics.
pub struct Metrics {
    registry: Registry,

    // === Worker pool ===
    /// Configured worker count per pool
    pub workers_total: GaugeVec,

    /// Workers currently executing a task
    pub workers_busy: GaugeVec,

    /// Configured queue capacity (+Inf when unbounded)
    pub queue_capacity: GaugeVec,

    /// Tasks waiting in the queue
    pub queue_depth: GaugeVec,

    /// Tasks accepted into the queue
    pub tasks_submitted_total: CounterVec,

    /// Submissions refused, by reason
    pub tasks_rejected_total: CounterVec,

    /// Tasks finished, by outcome (success, panicked, expired)
    pub tasks_total: CounterVec,

    /// Tasks dropped by a non-graceful shutdown
    pub tasks_discarded_total: CounterVec,

    /// Time spent queued before a worker picked the task up
    pub task_wait_seconds: HistogramVec,

    /// Task execution time
    pub task_duration_seconds: HistogramVec,

    // === Slot pool ===
    /// Acquire attempts, by outcome (hit, miss, timeout)
    pub slot_acquire_total: CounterVec,

    /// Slots currently held
    pub slots_in_use: GaugeVec,

    /// Total slots
    pub slots_capacity: GaugeVec,
}

impl Metrics {
    /// Create a new metrics registry with all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Task latency buckets (in seconds)
        let task_buckets = vec![
            0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ];

        let workers_total = GaugeVec::new(
            Opts::new("bounded_pool_workers_total", "Total number of workers"),
            &["pool"],
        )?;
        registry.register(Box::new(workers_total.clone()))?;

        let workers_busy = GaugeVec::new(
            Opts::new("bounded_pool_workers_busy", "Number of busy workers"),
            &["pool"],
        )?;
        registry.register(Box::new(workers_busy.clone()))?;

        let queue_capacity = GaugeVec::new(
            Opts::new("bounded_pool_queue_capacity", "Queue capacity"),
            &["pool"],
        )?;
        registry.register(Box::new(queue_capacity.clone()))?;

        let queue_depth = GaugeVec::new(
            Opts::new("bounded_pool_queue_depth", "Current queue depth"),
            &["pool"],
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        let tasks_submitted_total = CounterVec::new(
            Opts::new(
                "bounded_pool_tasks_submitted_total",
                "Tasks accepted into the queue",
            ),
            &["pool"],
        )?;
        registry.register(Box::new(tasks_submitted_total.clone()))?;

        let tasks_rejected_total = CounterVec::new(
            Opts::new(
                "bounded_pool_tasks_rejected_total",
                "Task submissions rejected",
            ),
            &["pool", "reason"],
        )?;
        registry.register(Box::new(tasks_rejected_total.clone()))?;

        let tasks_total = CounterVec::new(
            Opts::new("bounded_pool_tasks_total", "Tasks finished by outcome"),
            &["pool", "outcome"],
        )?;
        registry.register(Box::new(tasks_total.clone()))?;

        let tasks_discarded_total = CounterVec::new(
            Opts::new(
                "bounded_pool_tasks_discarded_total",
                "Queued tasks dropped by immediate shutdown",
            ),
            &["pool"],
        )?;
        registry.register(Box::new(tasks_discarded_total.clone()))?;

        let task_wait_seconds = HistogramVec::new(
            HistogramOpts::new(
                "bounded_pool_task_wait_seconds",
                "Time tasks spend queued in seconds",
            )
            .buckets(task_buckets.clone()),
            &["pool"],
        )?;
        registry.register(Box::new(task_wait_seconds.clone()))?;

        let task_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "bounded_pool_task_duration_seconds",
                "Task execution duration in seconds",
            )
            .buckets(task_buckets),
            &["pool"],
        )?;
        registry.register(Box::new(task_duration_seconds.clone()))?;

        let slot_acquire_total = CounterVec::new(
            Opts::new(
                "bounded_pool_slot_acquire_total",
                "Slot acquire attempts by outcome",
            ),
            &["pool", "outcome"],
        )?;
        registry.register(Box::new(slot_acquire_total.clone()))?;

        let slots_in_use = GaugeVec::new(
            Opts::new("bounded_pool_slots_in_use", "Slots currently held"),
            &["pool"],
        )?;
        registry.register(Box::new(slots_in_use.clone()))?;

        let slots_capacity = GaugeVec::new(
            Opts::new("bounded_pool_slots_capacity", "Total slots"),
            &["pool"],
        )?;
        registry.register(Box::new(slots_capacity.clone()))?;

        Ok(Self {
            registry,
            workers_total,
            workers_busy,
            queue_capacity,
            queue_depth,
            tasks_submitted_total,
            tasks_rejected_total,
            tasks_total,
            tasks_discarded_total,
            task_wait_seconds,
            task_duration_seconds,
            slot_acquire_total,
            slots_in_use,
            slots_capacity,
        })
    }

    /// Record static pool shape. `capacity` of `None` means unbounded.
    pub fn set_pool_info(&self, pool: &str, workers: usize, capacity: Option<usize>) {
        self.workers_total
            .with_label_values(&[pool])
            .set(workers as f64);
        self.queue_capacity
            .with_label_values(&[pool])
            .set(capacity.map_or(f64::INFINITY, |c| c as f64));
        self.workers_busy.with_label_values(&[pool]).set(0.0);
        self.queue_depth.with_label_values(&[pool]).set(0.0);
    }

    /// Count an accepted submission.
    pub fn record_submitted(&self, pool: &str) {
        self.tasks_submitted_total.with_label_values(&[pool]).inc();
    }

    /// Count a refused submission.
    pub fn record_rejected(&self, pool: &str, reason: &str) {
        self.tasks_rejected_total
            .with_label_values(&[pool, reason])
            .inc();
    }

    /// Record a finished task.
    pub fn record_task(&self, pool: &str, outcome: &str, wait_secs: f64, exec_secs: f64) {
        self.tasks_total.with_label_values(&[pool, outcome]).inc();
        self.task_wait_seconds
            .with_label_values(&[pool])
            .observe(wait_secs);
        if outcome != "expired" {
            self.task_duration_seconds
                .with_label_values(&[pool])
                .observe(exec_secs);
        }
    }

    /// Count tasks dropped by an immediate shutdown.
    pub fn record_discarded(&self, pool: &str, count: usize) {
        self.tasks_discarded_total
            .with_label_values(&[pool])
            .inc_by(count as f64);
    }

    /// Update queue depth.
    pub fn update_queue_depth(&self, pool: &str, depth: usize) {
        self.queue_depth.with_label_values(&[pool]).set(depth as f64);
    }

    /// Update busy worker count.
    pub fn update_busy_workers(&self, pool: &str, busy: usize) {
        self.workers_busy.with_label_values(&[pool]).set(busy as f64);
    }

    /// Count a slot acquire attempt.
    pub fn record_acquire(&self, pool: &str, outcome: &str) {
        self.slot_acquire_total
            .with_label_values(&[pool, outcome])
            .inc();
    }

    /// Update slot occupancy.
    pub fn update_slots(&self, pool: &str, in_use: usize, capacity: usize) {
        self.slots_in_use
            .with_label_values(&[pool])
            .set(in_use as f64);
        self.slots_capacity
            .with_label_values(&[pool])
            .set(capacity as f64);
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
