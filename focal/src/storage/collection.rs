//! Generic resilient store over one named collection.
//!
//! [`CollectionStore`] replaces a family of near-identical per-entity wrappers:
//! the record type supplies its collection name, sortable fields, secondary
//! indexes, validation and retention rules through [`Record`], and the store
//! supplies pagination, bulk writes, retry, error reporting and performance
//! tracking.

use chrono::Utc;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::{StoreConfig, retention_horizon};
use super::errors::{Severity, StoreError, StoreResult};
use super::metrics::{PerformanceWindow, StoreHealth};
use super::models::{BulkFailure, BulkOutcome, ListOptions, Page, SortDirection};
use super::retry::Resilience;
use super::traits::{CollectionBackend, IndexEntry, Record, WriteOp};

/// Resilient CRUD, pagination and bulk access to the collection of `T`.
///
/// Writes are serialized by a per-store lock; reads run concurrently. Every
/// public operation records its duration in the performance window and counts
/// failures, and every failure is reported through the store's
/// [`Resilience`] before it is returned.
#[derive(Debug)]
pub struct CollectionStore<T: Record> {
    backend: Arc<dyn CollectionBackend>,
    resilience: Resilience,
    config: StoreConfig,
    metrics: Mutex<PerformanceWindow>,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> CollectionStore<T> {
    /// Create a store for `T` on top of `backend`
    pub fn new(
        backend: Arc<dyn CollectionBackend>,
        config: StoreConfig,
        resilience: Resilience,
    ) -> Self {
        let metrics = PerformanceWindow::new(config.metrics_window, config.metrics_trim_to);
        Self {
            backend,
            resilience,
            config,
            metrics: Mutex::new(metrics),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Create a store with default configuration, retry policy and tracing reporter
    pub fn with_defaults(backend: Arc<dyn CollectionBackend>) -> Self {
        Self::new(backend, StoreConfig::default(), Resilience::default())
    }

    /// Name of the underlying collection
    pub fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn resilience(&self) -> &Resilience {
        &self.resilience
    }

    /// Whether `field` may be passed as `order_by`
    pub fn is_valid_sort_field(&self, field: &str) -> bool {
        T::is_valid_sort_field(field)
    }

    /// List records, ordered and paginated according to `options`
    pub async fn get_all(&self, options: ListOptions) -> StoreResult<Page<T>> {
        let label = self.label("get_all");
        self.instrument(&label, async {
            self.checked(&label, options.validate())?;
            let records = self.load_all(&label).await?;
            let ordered = self.order(records, &options);
            Ok(Page::paginate(
                ordered,
                options.offset.unwrap_or(0),
                options.limit,
            ))
        })
        .await
    }

    /// Fetch one record
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<T>> {
        let label = self.label("get_by_id");
        self.instrument(&label, self.fetch(&label, id)).await
    }

    /// Number of records in the collection
    pub async fn count(&self) -> StoreResult<usize> {
        let label = self.label("count");
        self.instrument(
            &label,
            self.resilience
                .retry(&label, || async move { self.backend.count(T::COLLECTION).await }),
        )
        .await
    }

    /// Records whose secondary `index` entry equals `value`
    pub async fn find_by_index(&self, index: &str, value: &str) -> StoreResult<Vec<T>> {
        let label = self.label("find_by_index");
        self.instrument(
            &label,
            self.resilience.retry(&label, || async move {
                let ids = self.backend.index_lookup(T::COLLECTION, index, value).await?;
                let mut records = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(value) = self.backend.get(T::COLLECTION, &id).await? {
                        records.push(Self::decode(&id, value)?);
                    }
                }
                Ok::<_, StoreError>(records)
            }),
        )
        .await
    }

    /// Insert (or replace) a record
    pub async fn add(&self, item: T) -> StoreResult<()> {
        let label = self.label("add");
        self.instrument(&label, async {
            let _guard = self.write_lock.lock().await;
            self.persist(&label, &item).await
        })
        .await
    }

    /// Apply a JSON merge patch to an existing record.
    ///
    /// `null` members remove optional fields; the id cannot change. Fails with
    /// `NOT_FOUND` if the record does not exist.
    pub async fn update(&self, id: &str, patch: Value) -> StoreResult<()> {
        let label = self.label("update");
        self.instrument(&label, async {
            let _guard = self.write_lock.lock().await;
            let Some(current) = self.fetch(&label, id).await? else {
                return self
                    .resilience
                    .fail(&label, StoreError::not_found(T::COLLECTION, id));
            };
            let updated = self.checked(&label, Self::apply_patch(&current, patch))?;
            self.persist(&label, &updated).await
        })
        .await
    }

    /// Mutate an existing record in place. Fails with `NOT_FOUND` if absent.
    pub async fn update_with<F>(&self, id: &str, mutate: F) -> StoreResult<T>
    where
        F: FnOnce(&mut T) + Send,
    {
        let label = self.label("update");
        self.instrument(&label, async {
            let _guard = self.write_lock.lock().await;
            let Some(mut record) = self.fetch(&label, id).await? else {
                return self
                    .resilience
                    .fail(&label, StoreError::not_found(T::COLLECTION, id));
            };
            mutate(&mut record);
            if record.id() != id {
                return self.resilience.fail(
                    &label,
                    StoreError::validation(format!("{} id cannot be changed", T::COLLECTION)),
                );
            }
            self.persist(&label, &record).await?;
            Ok(record)
        })
        .await
    }

    /// Remove a record. Fails with `NOT_FOUND` if absent.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let label = self.label("delete");
        self.instrument(&label, async {
            let _guard = self.write_lock.lock().await;
            let existed = self
                .resilience
                .retry(&label, || async move { self.backend.delete(T::COLLECTION, id).await })
                .await?;
            if !existed {
                return self
                    .resilience
                    .fail(&label, StoreError::not_found(T::COLLECTION, id));
            }
            Ok(())
        })
        .await
    }

    /// Write many records as one unit of work.
    ///
    /// Valid items commit even when others fail; if anything failed the
    /// returned error lists the failed ids and the committed ones in its
    /// context.
    pub async fn add_bulk(&self, items: Vec<T>) -> StoreResult<BulkOutcome> {
        let label = self.label("add_bulk");
        self.instrument(&label, async {
            let mut failures = Vec::new();
            let mut ops = Vec::with_capacity(items.len());
            for item in &items {
                match Self::prepare(item) {
                    Ok((value, indexes)) => ops.push(WriteOp::Put {
                        id: item.id().to_string(),
                        value,
                        indexes,
                    }),
                    Err(err) => failures.push(BulkFailure {
                        id: item.id().to_string(),
                        error: err.to_string(),
                    }),
                }
            }

            let _guard = self.write_lock.lock().await;
            let committed = self
                .run_batch(&label, ops, self.config.retry_writes, &mut failures)
                .await?;
            self.finish_bulk(&label, committed, failures)
        })
        .await
    }

    /// Delete many records as one unit of work; missing ids are failures
    pub async fn delete_bulk(&self, ids: Vec<String>) -> StoreResult<BulkOutcome> {
        let label = self.label("delete_bulk");
        self.instrument(&label, async {
            let ops = ids.into_iter().map(|id| WriteOp::Delete { id }).collect();
            let mut failures = Vec::new();

            let _guard = self.write_lock.lock().await;
            let committed = self.run_batch(&label, ops, true, &mut failures).await?;
            self.finish_bulk(&label, committed, failures)
        })
        .await
    }

    /// Remove records that fall outside the retention horizon
    /// (`now - retention_days`). Returns the number removed.
    pub async fn cleanup(&self) -> StoreResult<usize> {
        let label = self.label("cleanup");
        let work = async {
            let horizon = retention_horizon(Utc::now(), self.config.retention_days);
            let _guard = self.write_lock.lock().await;

            let rows = self.backend.scan(T::COLLECTION).await?;
            let mut expired = Vec::new();
            for (id, value) in rows {
                match Self::decode(&id, value) {
                    Ok(record) if !record.is_retained(horizon) => {
                        expired.push(WriteOp::Delete { id });
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(
                            collection = T::COLLECTION,
                            id = %id,
                            error = %err,
                            "skipping undecodable record during cleanup"
                        );
                    }
                }
            }

            if expired.is_empty() {
                debug!(collection = T::COLLECTION, "cleanup found nothing to remove");
                return Ok::<_, StoreError>(0);
            }

            let requested = expired.len();
            let results = self.backend.batch(T::COLLECTION, expired).await?;
            let removed = results.iter().filter(|r| r.is_ok()).count();
            if removed < requested {
                return Err(StoreError::operation_failed(format!(
                    "cleanup removed {} of {} expired records",
                    removed, requested
                ))
                .with_retryable(true));
            }

            self.resilience.reporter().log_info(
                &label,
                &format!("removed {} expired {} records", removed, T::COLLECTION),
            );
            Ok(removed)
        };

        self.instrument(&label, self.resilience.safe(&label, work))
            .await
    }

    /// Drop stored values that no longer decode into `T`.
    ///
    /// Failures of this pass itself carry `RECOVERY_FAILED`.
    pub async fn recover(&self) -> StoreResult<usize> {
        let label = self.label("recover");
        let work = async {
            let _guard = self.write_lock.lock().await;
            let rows = self.backend.scan(T::COLLECTION).await.map_err(|err| {
                StoreError::recovery_failed(format!("could not scan {}", T::COLLECTION))
                    .with_cause(err)
            })?;

            let corrupt: Vec<WriteOp> = rows
                .into_iter()
                .filter(|(id, value)| Self::decode(id, value.clone()).is_err())
                .map(|(id, _)| WriteOp::Delete { id })
                .collect();

            if corrupt.is_empty() {
                return Ok(0);
            }

            let requested = corrupt.len();
            let results = self
                .backend
                .batch(T::COLLECTION, corrupt)
                .await
                .map_err(|err| {
                    StoreError::recovery_failed(format!(
                        "could not remove corrupt {} records",
                        T::COLLECTION
                    ))
                    .with_cause(err)
                })?;

            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                return Err(StoreError::recovery_failed(format!(
                    "{} of {} corrupt {} records could not be removed",
                    failed,
                    requested,
                    T::COLLECTION
                )));
            }

            self.resilience.reporter().log_info(
                &label,
                &format!("removed {} corrupt {} records", requested, T::COLLECTION),
            );
            Ok::<_, StoreError>(requested)
        };

        self.instrument(&label, self.resilience.safe(&label, work))
            .await
    }

    /// Remove every record of the collection
    pub async fn clear(&self) -> StoreResult<()> {
        let label = self.label("clear");
        self.instrument(&label, async {
            let _guard = self.write_lock.lock().await;
            self.resilience
                .safe(&label, self.backend.clear(T::COLLECTION))
                .await
        })
        .await
    }

    /// Health derived from the performance window and the backend's own check
    pub async fn get_health(&self) -> StoreHealth {
        let backend_ok = matches!(self.backend.health_check().await, Ok(true));
        let window = self.metrics.lock().await;
        StoreHealth::evaluate(
            &window,
            self.config.slow_query_threshold,
            self.config.max_error_rate,
            backend_ok,
        )
    }

    fn label(&self, operation: &str) -> String {
        format!("{}.{}", T::COLLECTION, operation)
    }

    /// Time `work`, record the outcome in the performance window
    async fn instrument<R, Fut>(&self, label: &str, work: Fut) -> StoreResult<R>
    where
        Fut: Future<Output = StoreResult<R>>,
    {
        let started = Instant::now();
        let result = work.await;
        let elapsed = started.elapsed();

        if elapsed > self.config.slow_query_threshold {
            warn!(
                operation = label,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow store operation"
            );
        }

        self.metrics.lock().await.record(elapsed, result.is_ok());
        result
    }

    /// Report a locally produced failure
    fn checked<R>(&self, label: &str, result: StoreResult<R>) -> StoreResult<R> {
        result.or_else(|err| self.resilience.fail(label, err))
    }

    async fn fetch(&self, label: &str, id: &str) -> StoreResult<Option<T>> {
        self.resilience
            .retry(label, || async move {
                self.backend
                    .get(T::COLLECTION, id)
                    .await?
                    .map(|value| Self::decode(id, value))
                    .transpose()
            })
            .await
    }

    async fn load_all(&self, label: &str) -> StoreResult<Vec<T>> {
        self.resilience
            .retry(label, || async move {
                self.backend
                    .scan(T::COLLECTION)
                    .await?
                    .into_iter()
                    .map(|(id, value)| Self::decode(&id, value))
                    .collect::<StoreResult<Vec<T>>>()
            })
            .await
    }

    /// Validate, encode and write one record. Caller holds the write lock.
    async fn persist(&self, label: &str, item: &T) -> StoreResult<()> {
        let (value, indexes) = self.checked(label, Self::prepare(item))?;
        let id = item.id();

        if self.config.retry_writes {
            self.resilience
                .retry(label, || {
                    let value = value.clone();
                    let indexes = indexes.clone();
                    async move { self.backend.put(T::COLLECTION, id, value, indexes).await }
                })
                .await
        } else {
            self.resilience
                .safe(label, self.backend.put(T::COLLECTION, id, value, indexes))
                .await
        }
    }

    /// Execute a backend batch, splitting per-item results into committed ids
    /// and failures. Caller holds the write lock.
    async fn run_batch(
        &self,
        label: &str,
        ops: Vec<WriteOp>,
        retry: bool,
        failures: &mut Vec<BulkFailure>,
    ) -> StoreResult<Vec<String>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ops.iter().map(|op| op.id().to_string()).collect();
        let results = if retry {
            self.resilience
                .retry(label, || {
                    let ops = ops.clone();
                    async move { self.backend.batch(T::COLLECTION, ops).await }
                })
                .await?
        } else {
            self.resilience
                .safe(label, self.backend.batch(T::COLLECTION, ops))
                .await?
        };

        let mut committed = Vec::with_capacity(ids.len());
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(()) => committed.push(id),
                Err(err) => failures.push(BulkFailure {
                    id,
                    error: err.to_string(),
                }),
            }
        }
        Ok(committed)
    }

    fn finish_bulk(
        &self,
        label: &str,
        committed: Vec<String>,
        failures: Vec<BulkFailure>,
    ) -> StoreResult<BulkOutcome> {
        if failures.is_empty() {
            debug!(operation = label, committed = committed.len(), "bulk write committed");
            return Ok(BulkOutcome { committed });
        }

        let error = StoreError::operation_failed(format!(
            "{} of {} items failed",
            failures.len(),
            failures.len() + committed.len()
        ))
        .with_context(json!({
            "collection": T::COLLECTION,
            "committed": committed,
            "failed": failures,
        }));
        self.resilience.fail(label, error)
    }

    fn order(&self, mut records: Vec<T>, options: &ListOptions) -> Vec<T> {
        let field = match options.order_by.as_deref() {
            Some(field) if T::is_valid_sort_field(field) => Some(field),
            Some(field) => {
                warn!(
                    collection = T::COLLECTION,
                    field, "unknown sort field, falling back to id order"
                );
                None
            }
            None => None,
        };
        let descending = options.order_direction == SortDirection::Desc;

        records.sort_by(|a, b| {
            let ordering = match field {
                Some(field) => match (a.sort_value(field), b.sort_value(field)) {
                    (Some(x), Some(y)) if descending => y.cmp(&x),
                    (Some(x), Some(y)) => x.cmp(&y),
                    // records without a value go last either way
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                },
                None if descending => b.id().cmp(a.id()),
                None => a.id().cmp(b.id()),
            };
            ordering.then_with(|| a.id().cmp(b.id()))
        });
        records
    }

    fn prepare(item: &T) -> StoreResult<(Value, Vec<IndexEntry>)> {
        item.validate()?;
        let value = serde_json::to_value(item)?;
        Ok((value, item.index_entries()))
    }

    fn decode(id: &str, value: Value) -> StoreResult<T> {
        serde_json::from_value(value).map_err(|err| {
            StoreError::operation_failed(format!(
                "{} '{}' could not be decoded",
                T::COLLECTION,
                id
            ))
            .with_severity(Severity::High)
            .with_context(json!({ "collection": T::COLLECTION, "id": id }))
            .with_cause(err)
        })
    }

    fn apply_patch(current: &T, patch: Value) -> StoreResult<T> {
        if !patch.is_object() {
            return Err(StoreError::validation("patch must be a JSON object"));
        }

        let mut value = serde_json::to_value(current)?;
        merge_patch(&mut value, patch);

        let updated: T = serde_json::from_value(value).map_err(|err| {
            StoreError::validation(format!(
                "patch produces an invalid {} record: {}",
                T::COLLECTION,
                err
            ))
        })?;

        if updated.id() != current.id() {
            return Err(StoreError::validation(format!(
                "{} id cannot be changed",
                T::COLLECTION
            )));
        }
        Ok(updated)
    }
}

/// RFC 7396 JSON merge patch
fn merge_patch(target: &mut Value, patch: Value) {
    let Value::Object(entries) = patch else {
        *target = patch;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in entries {
            if value.is_null() {
                map.remove(&key);
            } else {
                merge_patch(map.entry(key).or_insert(Value::Null), value);
            }
        }
    }
}
