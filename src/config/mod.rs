//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use bounded_pool::config::Config;
//!
//! let config = Config::from_env()?;
//! let pool = config.pool.builder().build()?;
//! let slots = config.slots.build(|i| format!("conn-{i}"))?;
//! ```

mod error;
mod logging;
mod parse;
mod pool;
mod slots;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use pool::PoolConfig;
pub use slots::SlotConfig;

use tracing::info;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker pool configuration.
    pub pool: PoolConfig,
    /// Slot pool configuration.
    pub slots: SlotConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Export Prometheus metrics.
    pub metrics: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pool: PoolConfig::from_env()?,
            slots: SlotConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            metrics: parse::env_bool("METRICS", false),
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Pool: {}", self.pool.name);
        info!("  Workers: {}", self.pool.worker_count());
        info!("  Queue capacity: {}", self.pool.capacity());
        info!("  Slots: {} ({})", self.slots.size(), self.slots.mode);
        info!("  Log format: {}", self.logging.format);
        if self.metrics {
            info!("  Metrics: enabled");
        }
    }
}
