//! Retry with exponential backoff and the single-shot safe wrapper.
//!
//! Every public store operation goes through one of the two entry points here:
//! [`with_retry`] for idempotent work and [`safe_operation`] for everything
//! else. Both report final failures to an [`ErrorReporter`] and never panic
//! past their boundary.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::errors::{Severity, StoreError, StoreResult};
use super::reporter::{ErrorReporter, TracingReporter};

/// Backoff policy for a retried operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of invocations, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Factor applied to the delay after every failed attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Delay to wait after the `attempt`-th failure (1-based):
    /// `min(base * multiplier^(attempt - 1), max)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be >= 1.0".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("base_delay_ms must not exceed max_delay_ms".to_string());
        }
        Ok(())
    }
}

/// Invoke `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` invocations have been made.
///
/// Intermediate failures are reported through `log_warn`. The final failure is reported
/// to `reporter`: either the non-retryable error itself, or a
/// `RETRY_EXHAUSTED` error wrapping the last cause.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    label: &str,
    reporter: &dyn ErrorReporter,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<StoreError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_error: Option<StoreError> = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = label, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let err: StoreError = err.into();
                if !err.retryable {
                    reporter.log_error(label, &err);
                    return Err(err);
                }

                if attempt < max_attempts {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, retrying"
                    );
                    reporter.log_warn(label, &err);
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(err);
            }
        }
    }

    let error = StoreError::retry_exhausted(label, max_attempts, last_error);
    reporter.log_error(label, &error);
    Err(error)
}

/// Run `operation` exactly once.
///
/// Foreign errors are converted into `OPERATION_FAILED` store errors, a panic
/// inside the future is caught, and every failure is reported before it is
/// returned.
pub async fn safe_operation<T, E, Fut>(
    operation: Fut,
    label: &str,
    reporter: &dyn ErrorReporter,
) -> StoreResult<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<StoreError>,
{
    let error = match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => err.into(),
        Err(panic) => StoreError::operation_failed(format!(
            "{} panicked: {}",
            label,
            panic_message(panic.as_ref())
        ))
        .with_severity(Severity::Critical),
    };

    reporter.log_error(label, &error);
    Err(error)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Retry policy and reporter bundled together, as carried by each store
#[derive(Debug, Clone)]
pub struct Resilience {
    config: RetryConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(RetryConfig::default(), Arc::new(TracingReporter))
    }
}

impl Resilience {
    pub fn new(config: RetryConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { config, reporter }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    pub fn reporter_arc(&self) -> Arc<dyn ErrorReporter> {
        Arc::clone(&self.reporter)
    }

    /// [`with_retry`] using this policy
    pub async fn retry<T, E, F, Fut>(&self, label: &str, operation: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        with_retry(operation, &self.config, label, self.reporter.as_ref()).await
    }

    /// [`with_retry`] with a per-call override of the policy
    pub async fn retry_with<T, E, F, Fut>(
        &self,
        label: &str,
        config: &RetryConfig,
        operation: F,
    ) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        with_retry(operation, config, label, self.reporter.as_ref()).await
    }

    /// [`safe_operation`] using this reporter
    pub async fn safe<T, E, Fut>(&self, label: &str, operation: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        safe_operation(operation, label, self.reporter.as_ref()).await
    }

    /// Report `error` and hand it back as a failed result
    pub fn fail<T>(&self, label: &str, error: StoreError) -> StoreResult<T> {
        self.reporter.log_error(label, &error);
        Err(error)
    }
}
