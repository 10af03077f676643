//! Error reporting sink used by the retry kernel and the stores.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Mutex;

use super::errors::{Severity, StoreError};

/// Collaborator that receives every reported failure.
///
/// The kernel calls `log_warn` for each failed attempt it retries,
/// `log_error` for final failures and `log_info` for operational notices
/// such as cleanup counts.
pub trait ErrorReporter: Send + Sync + Debug {
    /// Report a failure of the operation identified by `label`
    fn log_error(&self, label: &str, error: &StoreError);

    /// Report a failed attempt that is about to be retried
    fn log_warn(&self, label: &str, error: &StoreError);

    /// Report an informational message about `label`
    fn log_info(&self, label: &str, message: &str);
}

/// Reporter that forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn log_error(&self, label: &str, error: &StoreError) {
        let context = error
            .context
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();

        match error.severity {
            Severity::Low => tracing::warn!(
                operation = label,
                code = %error.code,
                severity = %error.severity,
                retryable = error.retryable,
                context = %context,
                "{}",
                error
            ),
            _ => tracing::error!(
                operation = label,
                code = %error.code,
                severity = %error.severity,
                retryable = error.retryable,
                context = %context,
                "{}",
                error
            ),
        }
    }

    fn log_warn(&self, label: &str, error: &StoreError) {
        tracing::warn!(
            operation = label,
            code = %error.code,
            retryable = error.retryable,
            "{}",
            error
        );
    }

    fn log_info(&self, label: &str, message: &str) {
        tracing::info!(operation = label, "{}", message);
    }
}

/// A single captured report
#[derive(Debug, Clone)]
pub enum Report {
    Error { label: String, error: StoreError },
    Warn { label: String, error: StoreError },
    Info { label: String, message: String },
}

/// Reports kept by [`MemoryReporter::new`]
pub const DEFAULT_REPORT_LIMIT: usize = 1024;

/// Reporter that keeps the most recent reports in memory, dropping the
/// oldest once `limit` is reached.
#[derive(Debug)]
pub struct MemoryReporter {
    reports: Mutex<VecDeque<Report>>,
    limit: usize,
}

impl Default for MemoryReporter {
    fn default() -> Self {
        Self::with_limit(DEFAULT_REPORT_LIMIT)
    }
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    /// Reports currently kept, oldest first
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Only the reported errors
    pub fn errors(&self) -> Vec<StoreError> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::Error { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }

    /// Only the retried failures
    pub fn warnings(&self) -> Vec<StoreError> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::Warn { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }

    /// Only the informational messages
    pub fn infos(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::Info { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn push(&self, report: Report) {
        let mut reports = self
            .reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if reports.len() == self.limit {
            reports.pop_front();
        }
        reports.push_back(report);
    }
}

impl ErrorReporter for MemoryReporter {
    fn log_error(&self, label: &str, error: &StoreError) {
        self.push(Report::Error {
            label: label.to_string(),
            error: error.clone(),
        });
    }

    fn log_warn(&self, label: &str, error: &StoreError) {
        self.push(Report::Warn {
            label: label.to_string(),
            error: error.clone(),
        });
    }

    fn log_info(&self, label: &str, message: &str) {
        self.push(Report::Info {
            label: label.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_separates_errors_and_infos() {
        let reporter = MemoryReporter::new();
        reporter.log_error("visit.add", &StoreError::operation_failed("boom"));
        reporter.log_info("visit.cleanup", "removed 3 records");

        assert_eq!(reporter.reports().len(), 2);
        assert_eq!(reporter.errors()[0].message, "boom");
        assert_eq!(reporter.infos(), vec!["removed 3 records".to_string()]);

        reporter.clear();
        assert!(reporter.reports().is_empty());
    }

    #[test]
    fn test_memory_reporter_drops_oldest_past_limit() {
        let reporter = MemoryReporter::with_limit(2);
        reporter.log_warn("visit.get_all", &StoreError::operation_failed("first"));
        reporter.log_error("visit.get_all", &StoreError::operation_failed("second"));
        reporter.log_info("visit.cleanup", "third");

        assert_eq!(reporter.reports().len(), 2);
        assert!(reporter.warnings().is_empty());
        assert_eq!(reporter.errors()[0].message, "second");
        assert_eq!(reporter.infos(), vec!["third".to_string()]);
    }
}
