//! Rolling query-duration window and the health report derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Bounded record of recent query durations plus lifetime counters.
///
/// When the window grows past `capacity` it is trimmed down to the most recent
/// `trim_to` entries.
#[derive(Debug, Clone)]
pub struct PerformanceWindow {
    durations: VecDeque<Duration>,
    capacity: usize,
    trim_to: usize,
    total_queries: u64,
    error_count: u64,
}

impl PerformanceWindow {
    pub fn new(capacity: usize, trim_to: usize) -> Self {
        Self {
            durations: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            trim_to: trim_to.clamp(1, capacity.max(1)),
            total_queries: 0,
            error_count: 0,
        }
    }

    /// Record one finished operation
    pub fn record(&mut self, duration: Duration, succeeded: bool) {
        self.total_queries += 1;
        if !succeeded {
            self.error_count += 1;
        }

        self.durations.push_back(duration);
        if self.durations.len() > self.capacity {
            let excess = self.durations.len() - self.trim_to;
            self.durations.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Mean duration in milliseconds over the window
    pub fn average_ms(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .durations
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .sum();
        total / self.durations.len() as f64
    }

    /// Entries in the window slower than `threshold`
    pub fn slow_queries(&self, threshold: Duration) -> usize {
        self.durations.iter().filter(|d| **d > threshold).count()
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn snapshot(&self, threshold: Duration) -> PerformanceSnapshot {
        PerformanceSnapshot {
            avg_query_time_ms: self.average_ms(),
            slow_queries: self.slow_queries(threshold),
            error_count: self.error_count,
            total_queries: self.total_queries,
        }
    }
}

/// Performance figures reported by [`StoreHealth`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSnapshot {
    pub avg_query_time_ms: f64,
    pub slow_queries: usize,
    pub error_count: u64,
    pub total_queries: u64,
}

/// Health of one collection store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreHealth {
    pub is_healthy: bool,
    pub last_checked: DateTime<Utc>,
    pub issues: Vec<String>,
    pub performance: PerformanceSnapshot,
}

impl StoreHealth {
    /// Derive health from the window. `backend_ok` is the result of the
    /// backend's own health check.
    pub fn evaluate(
        window: &PerformanceWindow,
        threshold: Duration,
        max_error_rate: f64,
        backend_ok: bool,
    ) -> Self {
        let performance = window.snapshot(threshold);
        let threshold_ms = threshold.as_secs_f64() * 1000.0;
        let mut issues = Vec::new();

        if !backend_ok {
            issues.push("Backend health check failed".to_string());
        }

        if performance.avg_query_time_ms > threshold_ms {
            issues.push(format!(
                "Average query time {:.1}ms exceeds {:.0}ms",
                performance.avg_query_time_ms, threshold_ms
            ));
        }

        if performance.total_queries > 0 {
            let error_rate = performance.error_count as f64 / performance.total_queries as f64;
            if error_rate > max_error_rate {
                issues.push(format!(
                    "Error rate {:.1}% ({} of {} operations)",
                    error_rate * 100.0,
                    performance.error_count,
                    performance.total_queries
                ));
            }
        }

        Self {
            is_healthy: issues.is_empty(),
            last_checked: Utc::now(),
            issues,
            performance,
        }
    }
}
