//! Storage configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted retention window, in days
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// `now - days`, saturating at the earliest representable instant
pub fn retention_horizon(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    chrono::Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Settings shared by every collection store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Records older than this many days are removed by `cleanup`
    pub retention_days: i64,

    /// Average (and single query) duration above which the store is reported slow
    #[serde(with = "humantime_serde")]
    pub slow_query_threshold: Duration,

    /// Maximum number of durations kept in the performance window
    pub metrics_window: usize,

    /// Size the window is trimmed to once `metrics_window` is exceeded
    pub metrics_trim_to: usize,

    /// Error rate (0.0 - 1.0) above which the store is reported unhealthy
    pub max_error_rate: f64,

    /// Whether non-idempotent writes go through the retry kernel
    pub retry_writes: bool,

    /// Interval between scheduled cleanup runs
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Delay before the first scheduled cleanup run
    #[serde(with = "humantime_serde")]
    pub cleanup_initial_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            slow_query_threshold: Duration::from_millis(500),
            metrics_window: 1000,
            metrics_trim_to: 100,
            max_error_rate: 0.1,
            retry_writes: false,
            cleanup_interval: Duration::from_secs(60 * 60),
            cleanup_initial_delay: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Validate the configuration, returning an error if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.retention_days <= 0 || self.retention_days > MAX_RETENTION_DAYS {
            return Err(format!(
                "retention_days must be between 1 and {}",
                MAX_RETENTION_DAYS
            ));
        }
        if self.metrics_window == 0 {
            return Err("metrics_window must be greater than 0".to_string());
        }
        if self.metrics_trim_to == 0 || self.metrics_trim_to > self.metrics_window {
            return Err("metrics_trim_to must be between 1 and metrics_window".to_string());
        }
        if !(0.0..=1.0).contains(&self.max_error_rate) {
            return Err("max_error_rate must be between 0.0 and 1.0".to_string());
        }
        if self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retention_is_bounded() {
        assert!(StoreConfig::default().validate().is_ok());

        let huge = StoreConfig {
            retention_days: 1_000_000_000,
            ..Default::default()
        };
        assert!(huge.validate().is_err());

        let longest = StoreConfig {
            retention_days: MAX_RETENTION_DAYS,
            ..Default::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_horizon_saturates() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(
            retention_horizon(now, 10),
            Utc.with_ymd_and_hms(2026, 2, 28, 0, 0, 0).unwrap()
        );
        assert_eq!(retention_horizon(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(retention_horizon(now, 1_000_000_000), DateTime::<Utc>::MIN_UTC);
    }
}
