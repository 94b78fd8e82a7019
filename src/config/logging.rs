//! Logging configuration.

use std::fmt;

use super::parse::{env_opt, env_or};
use super::ConfigError;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable `tracing-subscriber` fmt output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name for structured logging.
    pub service_name: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            service_name: "bounded_pool".to_string(),
            format: LogFormat::Text,
        }
    }
}

const DEFAULT_FILTER: &str = "bounded_pool=info";

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error.
    /// RUST_LOG accepts full filter syntax: bounded_pool=debug,other=warn.
    pub fn from_env() -> Result<Self, ConfigError> {
        let filter = resolve_log_filter(env_opt("LOG_LEVEL").as_deref(), env_opt("RUST_LOG").as_deref())?;
        let format = match env_or("LOG_FORMAT", "text").to_lowercase().as_str() {
            "text" | "" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT".into(),
                    message: format!("expected text or json, got '{}'", other),
                })
            }
        };

        Ok(Self {
            filter,
            service_name: env_or("SERVICE_NAME", "bounded_pool"),
            format,
        })
    }
}

/// Priority: LOG_LEVEL > RUST_LOG > default.
fn resolve_log_filter(
    log_level: Option<&str>,
    rust_log: Option<&str>,
) -> Result<String, ConfigError> {
    if let Some(level) = log_level {
        let level = level.to_lowercase();
        return match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(format!("bounded_pool={}", level)),
            _ => Err(ConfigError::Invalid {
                key: "LOG_LEVEL".into(),
                message: format!("expected trace, debug, info, warn or error, got '{}'", level),
            }),
        };
    }

    Ok(rust_log.unwrap_or(DEFAULT_FILTER).to_string())
}
