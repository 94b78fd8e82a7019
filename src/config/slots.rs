//! Slot pool configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_duration, env_or, env_parse};
use super::ConfigError;
use crate::slots::{AcquireMode, SlotPool, SlotResult};

/// Slot pool configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct SlotConfig {
    /// Number of slots.
    size: NonZeroUsize,
    /// Behavior of `acquire` when every slot is held.
    pub mode: AcquireMode,
}

impl SlotConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let size: usize = env_parse("SLOT_POOL_SIZE", 3)?;
        let size = NonZeroUsize::new(size).ok_or_else(|| ConfigError::Invalid {
            key: "SLOT_POOL_SIZE".into(),
            message: "slot pool needs at least one slot".into(),
        })?;
        let timeout = env_duration("SLOT_ACQUIRE_TIMEOUT", "off")?;
        let mode = parse_mode(&env_or("SLOT_ACQUIRE_MODE", "immediate"), timeout)?;

        Ok(Self { size, mode })
    }

    /// Get slot count.
    #[inline]
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Build a slot pool of this size and mode, one resource per `factory` call.
    pub fn build<T, F>(&self, factory: F) -> SlotResult<SlotPool<T>>
    where
        F: FnMut(usize) -> T,
    {
        Ok(SlotPool::with_factory(self.size(), factory)?.with_mode(self.mode))
    }
}

fn parse_mode(raw: &str, timeout: Option<Duration>) -> Result<AcquireMode, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "" | "immediate" => Ok(AcquireMode::Immediate),
        "blocking" => Ok(AcquireMode::Blocking { timeout }),
        other => Err(ConfigError::Invalid {
            key: "SLOT_ACQUIRE_MODE".into(),
            message: format!("expected immediate or blocking, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("immediate", None).unwrap(), AcquireMode::Immediate);
        assert_eq!(
            parse_mode("Blocking", Some(Duration::from_secs(2))).unwrap(),
            AcquireMode::Blocking {
                timeout: Some(Duration::from_secs(2))
            }
        );
        assert!(parse_mode("sometimes", None).is_err());
    }

    #[test]
    fn test_build_pool() {
        let config = SlotConfig {
            size: NonZeroUsize::new(2).unwrap(),
            mode: AcquireMode::Immediate,
        };
        let pool = config.build(|i| i * 10).unwrap();
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.mode(), AcquireMode::Immediate);
    }
}
