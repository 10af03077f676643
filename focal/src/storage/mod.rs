//! Storage abstractions and implementations
//!
//! Every persisted entity lives in a named collection of an embedded object
//! store ([`CollectionBackend`]). [`CollectionStore`] wraps one collection with
//! pagination, allow-listed sorting, bulk writes, retention cleanup and health
//! tracking, and routes every backend call through the retry kernel in
//! [`retry`].
//!
//! ## Backends
//!
//! - **Memory**: ordered in-process maps with secondary indexes; batches hold a
//!   single write guard so they are atomic with respect to other writers.

pub mod collection;
pub mod config;
pub mod errors;
pub mod memory;
pub mod metrics;
pub mod models;
pub mod reporter;
pub mod retry;
pub mod scheduler;
pub mod traits;

pub use collection::CollectionStore;
pub use config::{MAX_RETENTION_DAYS, StoreConfig, retention_horizon};
pub use errors::{BackendError, BackendResult, ErrorCode, Severity, StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use metrics::{PerformanceSnapshot, PerformanceWindow, StoreHealth};
pub use models::{BulkFailure, BulkOutcome, ListOptions, Page, SortDirection};
pub use reporter::{ErrorReporter, MemoryReporter, Report, TracingReporter};
pub use retry::{Resilience, RetryConfig, safe_operation, with_retry};
pub use scheduler::{Cleanable, CleanupListener, CleanupReport, CleanupScheduler};
pub use traits::{CollectionBackend, IndexEntry, Record, SortValue, WriteOp};

use std::sync::Arc;

/// Create an in-memory backend
pub fn memory_backend() -> Arc<dyn CollectionBackend> {
    Arc::new(MemoryBackend::new())
}
