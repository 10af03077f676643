//! Error types for storage operations

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Machine-readable classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Generic wrap of a failure raised by an operation
    OperationFailed,

    /// Every retry attempt was consumed
    RetryExhausted,

    /// Update or delete target is missing
    NotFound,

    /// The corruption-recovery path itself failed
    RecoveryFailed,

    /// A record or request was rejected by a validation hook
    ValidationFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::OperationFailed => write!(f, "OPERATION_FAILED"),
            ErrorCode::RetryExhausted => write!(f, "RETRY_EXHAUSTED"),
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::RecoveryFailed => write!(f, "RECOVERY_FAILED"),
            ErrorCode::ValidationFailed => write!(f, "VALIDATION_FAILED"),
        }
    }
}

/// Triage weight of an error. Only affects how loudly it is logged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Structured failure produced by every public store operation.
///
/// `retryable` is the only flag the retry kernel looks at; `severity` is for
/// whoever reads the logs.
#[derive(Debug, Clone)]
pub struct StoreError {
    /// Human readable description
    pub message: String,

    /// Classification
    pub code: ErrorCode,

    /// Triage weight
    pub severity: Severity,

    /// Whether another attempt may succeed
    pub retryable: bool,

    /// Arbitrary structured context (ids, counts, collection names)
    pub context: Option<serde_json::Value>,

    /// Underlying cause, if any
    pub cause: Option<Arc<dyn Error + Send + Sync>>,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create an error with the given code, medium severity, not retryable
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            severity: Severity::Medium,
            retryable: false,
            context: None,
            cause: None,
        }
    }

    /// Generic operation failure
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationFailed, message)
    }

    /// Missing update/delete target
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{} '{}' not found", collection, id),
        )
        .with_severity(Severity::Low)
        .with_context(serde_json::json!({ "collection": collection, "id": id }))
    }

    /// Rejected by a validation hook
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_severity(Severity::Low)
    }

    /// All attempts consumed; wraps the last failure
    pub fn retry_exhausted(label: &str, attempts: u32, last: Option<StoreError>) -> Self {
        let error = Self::new(
            ErrorCode::RetryExhausted,
            format!("{} failed after {} attempts", label, attempts),
        )
        .with_severity(Severity::High)
        .with_context(serde_json::json!({ "operation": label, "attempts": attempts }));

        match last {
            Some(cause) => error.with_cause(cause),
            None => error,
        }
    }

    /// The recovery pass failed
    pub fn recovery_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RecoveryFailed, message).with_severity(Severity::Critical)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Whether this error carries the given code
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    /// The wrapped cause as a `StoreError`, when it is one
    pub fn store_cause(&self) -> Option<&StoreError> {
        self.cause
            .as_deref()
            .and_then(|cause| (cause as &(dyn Error + 'static)).downcast_ref::<StoreError>())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Error type raised by a [`CollectionBackend`](super::traits::CollectionBackend)
#[derive(Debug)]
pub enum BackendError {
    /// Backend cannot be reached right now
    Unavailable(String),

    /// Write conflicted with a concurrent transaction
    Conflict(String),

    /// Target key does not exist
    NotFound(String),

    /// Stored bytes could not be (de)serialized
    Serialization(String),

    /// Stored data is corrupt
    Corrupt(String),

    /// Transaction was aborted
    Transaction(String),

    /// Other error
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Transient failures are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable(_) | BackendError::Conflict(_) | BackendError::Transaction(_)
        )
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            BackendError::Conflict(msg) => write!(f, "Write conflict: {}", msg),
            BackendError::NotFound(msg) => write!(f, "Not found: {}", msg),
            BackendError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            BackendError::Corrupt(msg) => write!(f, "Corrupt data: {}", msg),
            BackendError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            BackendError::Other(msg) => write!(f, "Other error: {}", msg),
        }
    }
}

impl Error for BackendError {}

/// Backend failures surface as `OPERATION_FAILED`; transient ones may be retried
impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(ref msg) => StoreError::new(ErrorCode::NotFound, msg.clone())
                .with_severity(Severity::Low)
                .with_cause(err),
            BackendError::Corrupt(_) => StoreError::operation_failed(err.to_string())
                .with_severity(Severity::Critical)
                .with_cause(err),
            _ => {
                let retryable = err.is_transient();
                StoreError::operation_failed(err.to_string())
                    .with_retryable(retryable)
                    .with_cause(err)
            }
        }
    }
}

/// Convert a JSON error to a store error
impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::operation_failed(format!("Serialization error: {}", err))
            .with_severity(Severity::High)
            .with_cause(err)
    }
}

/// Convert a standard IO error to a store error
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::operation_failed(err.to_string())
            .with_retryable(true)
            .with_cause(err)
    }
}
