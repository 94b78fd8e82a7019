//! Integration tests for bounded_pool
//!
//! Run with: cargo test --test integration

mod helpers;

mod global;
mod shutdown;
mod slot_pool;
mod worker_pool;
