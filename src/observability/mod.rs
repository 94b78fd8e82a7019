//! Observability for worker and slot pools.
//!
//! Structured logging lives in [`crate::logging`]; this module holds the
//! Prometheus side.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bounded_pool::observability::Metrics;
//! use bounded_pool::pool::WorkerPool;
//!
//! let metrics = Arc::new(Metrics::new()?);
//! let pool = WorkerPool::builder().metrics(Arc::clone(&metrics)).build()?;
//! println!("{}", metrics.export());
//! ```

pub mod metrics;

pub use metrics::Metrics;
