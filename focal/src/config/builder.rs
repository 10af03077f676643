//! Configuration builder.
//!
//! This module provides a builder pattern API for creating configurations.

use super::{Result, models::*, validation};
use std::path::Path;
use std::time::Duration;

/// Builder for creating FocalConfig instances.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: FocalConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: FocalConfig::default(),
        }
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Configure logging to a file.
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the default retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the maximum number of attempts for retried operations.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self
    }

    /// Set how long records are kept before cleanup removes them.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.config.store.retention_days = days;
        self.config.ranking.retention_days = days;
        self
    }

    /// Set the slow query threshold used by store health checks.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.config.store.slow_query_threshold = threshold;
        self
    }

    /// Retry non-idempotent writes as well as reads and deletes.
    pub fn with_retried_writes(mut self) -> Self {
        self.config.store.retry_writes = true;
        self
    }

    /// Set the interval of scheduled cleanup.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.store.cleanup_interval = interval;
        self
    }

    /// Set the ranking decay base.
    pub fn with_decay_base(mut self, base: f64) -> Self {
        self.config.ranking.decay_base = base;
        self
    }

    /// Fix the observer's UTC offset used for day boundaries.
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.config.ranking.utc_offset_minutes = Some(minutes);
        self
    }

    /// Set the number of suggested tags.
    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.config.relevance.max_terms = max_terms;
        self
    }

    /// Create a configuration for development.
    ///
    /// - Debug-level logging in pretty format
    pub fn development() -> Self {
        Self::new()
            .with_log_level(LogLevel::Debug)
            .with_log_format(LogFormat::Pretty)
    }

    /// Create a configuration for testing.
    ///
    /// - Warn-level compact logging
    /// - A single attempt with no backoff, so failures surface immediately
    /// - UTC day boundaries
    pub fn testing() -> Self {
        Self::new()
            .with_log_level(LogLevel::Warn)
            .with_log_format(LogFormat::Compact)
            .with_retry(RetryConfig::no_retry())
            .with_utc_offset_minutes(0)
    }

    /// Create a production configuration.
    ///
    /// - JSON logging at Info level
    pub fn production() -> Self {
        Self::new()
            .with_log_level(LogLevel::Info)
            .with_log_format(LogFormat::Json)
    }

    /// Build the configuration, validating it in the process.
    pub fn build(self) -> Result<FocalConfig> {
        validation::validate_config(&self.config)?;

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
