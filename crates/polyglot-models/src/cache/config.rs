//! Configuration for model caching.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration for the model cache.
///
/// Without `max_models` and `idle_timeout_secs` the cache is unbounded and
/// keeps every loaded model until shutdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of ready models to keep; least recently used go first.
    #[serde(default)]
    pub max_models: Option<usize>,

    /// Seconds a ready model may stay unused before it is evicted.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,

    /// How often the idle sweep runs in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// How long a caller waits for a load before giving up (default: 600).
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,

    /// Extra load attempts made before a load is reported as failed.
    #[serde(default)]
    pub load_retries: u32,

    /// Base delay between load attempts, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_cleanup_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_load_timeout_secs() -> u64 {
    600 // large multilingual models take minutes to fetch
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// Errors that can occur during cache configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheConfigError {
    /// Invalid max models (must be > 0 when set).
    #[error("Invalid max models: must be greater than 0")]
    InvalidMaxModels,

    /// Invalid idle timeout (must be > 0 when set).
    #[error("Invalid idle timeout: must be greater than 0")]
    InvalidIdleTimeout,

    /// Invalid cleanup interval (must be > 0).
    #[error("Invalid cleanup interval: must be greater than 0")]
    InvalidCleanupInterval,

    /// Invalid load timeout (must be > 0).
    #[error("Invalid load timeout: must be greater than 0")]
    InvalidLoadTimeout,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_models: None,
            idle_timeout_secs: None,
            cleanup_interval_secs: default_cleanup_interval_secs(),
            load_timeout_secs: default_load_timeout_secs(),
            load_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl CacheConfig {
    /// Validate the cache configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.max_models == Some(0) {
            return Err(CacheConfigError::InvalidMaxModels);
        }

        if self.idle_timeout_secs == Some(0) {
            return Err(CacheConfigError::InvalidIdleTimeout);
        }

        if self.cleanup_interval_secs == 0 {
            return Err(CacheConfigError::InvalidCleanupInterval);
        }

        if self.load_timeout_secs == 0 {
            return Err(CacheConfigError::InvalidLoadTimeout);
        }

        Ok(())
    }

    /// Get the idle timeout as a Duration, if idle eviction is enabled.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Get the cleanup interval as a Duration.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Get the load wait timeout as a Duration.
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
