//! Integration tests for the collection store
//!
//! These tests exercise `CollectionStore` end to end over the in-memory
//! backend, including:
//! - Pagination and ordering
//! - Merge-patch updates and NOT_FOUND handling
//! - Bulk writes with partial failures
//! - Retention cleanup and corruption recovery
//! - Retry behaviour against a flaky backend

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use focal::models::{Visit, Website};
use focal::storage::{
    BackendError, BackendResult, CollectionBackend, CollectionStore, ErrorCode, IndexEntry,
    ListOptions, MemoryBackend, MemoryReporter, Resilience, RetryConfig, SortDirection,
    StoreConfig, WriteOp,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

fn store_on<T: focal::storage::Record>(
    backend: Arc<dyn CollectionBackend>,
    retry: RetryConfig,
) -> (CollectionStore<T>, Arc<MemoryReporter>) {
    let reporter = Arc::new(MemoryReporter::new());
    let resilience = Resilience::new(retry, reporter.clone());
    let store = CollectionStore::new(backend, StoreConfig::default(), resilience);
    (store, reporter)
}

fn website_store() -> (CollectionStore<Website>, Arc<MemoryReporter>) {
    store_on(Arc::new(MemoryBackend::new()), RetryConfig::no_retry())
}

fn site(id: &str, title: &str) -> Website {
    Website::new(format!("https://{}.example.com/", id), title).with_id(id)
}

async fn seed(store: &CollectionStore<Website>, count: usize) {
    for i in 0..count {
        store
            .add(site(&format!("site-{}", i), &format!("Title {}", count - i)))
            .await
            .unwrap();
    }
}

/// Backend wrapper whose scans fail with a transient error a fixed number of times
#[derive(Debug)]
struct FlakyBackend {
    inner: MemoryBackend,
    failures_left: AtomicU32,
    scans: AtomicU32,
}

impl FlakyBackend {
    fn new(failures: u32) -> Self {
        Self {
            inner: MemoryBackend::new(),
            failures_left: AtomicU32::new(failures),
            scans: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl CollectionBackend for FlakyBackend {
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<serde_json::Value>> {
        self.inner.get(collection, id).await
    }

    async fn scan(&self, collection: &str) -> BackendResult<Vec<(String, serde_json::Value)>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Unavailable("store is busy".to_string()));
        }
        self.inner.scan(collection).await
    }

    async fn count(&self, collection: &str) -> BackendResult<usize> {
        self.inner.count(collection).await
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        value: serde_json::Value,
        indexes: Vec<IndexEntry>,
    ) -> BackendResult<()> {
        self.inner.put(collection, id, value, indexes).await
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<bool> {
        self.inner.delete(collection, id).await
    }

    async fn batch(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
    ) -> BackendResult<Vec<BackendResult<()>>> {
        self.inner.batch(collection, ops).await
    }

    async fn index_lookup(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> BackendResult<Vec<String>> {
        self.inner.index_lookup(collection, index, value).await
    }

    async fn clear(&self, collection: &str) -> BackendResult<()> {
        self.inner.clear(collection).await
    }
}

#[tokio::test]
async fn test_get_all_is_idempotent() {
    let (store, _) = website_store();
    seed(&store, 5).await;

    let options = ListOptions::new().limit(2).offset(1);
    let first = store.get_all(options.clone()).await.unwrap();
    let second = store.get_all(options).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_pagination_covers_every_record_once() {
    let (store, _) = website_store();
    seed(&store, 7).await;

    let mut collected = Vec::new();
    let mut offset = 0;
    loop {
        let page = store
            .get_all(ListOptions::new().limit(3).offset(offset))
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        assert!(page.data.len() <= 3);
        collected.extend(page.data.into_iter().map(|w| w.id));

        match page.next_offset {
            Some(next) => {
                assert!(page.has_more);
                offset = next;
            }
            None => {
                assert!(!page.has_more);
                break;
            }
        }
    }

    let everything = store.get_all(ListOptions::default()).await.unwrap();
    let all_ids: Vec<String> = everything.data.into_iter().map(|w| w.id).collect();
    assert_eq!(collected, all_ids);
    assert!(!everything.has_more);
}

#[tokio::test]
async fn test_order_by_allowed_field() {
    let (store, _) = website_store();
    store.add(site("a", "banana")).await.unwrap();
    store.add(site("b", "Apple")).await.unwrap();
    store.add(site("c", "cherry")).await.unwrap();

    let page = store
        .get_all(ListOptions::new().order_by("title", SortDirection::Desc))
        .await
        .unwrap();
    let titles: Vec<&str> = page.data.iter().map(|w| w.title.as_str()).collect();
    assert_eq!(titles, vec!["cherry", "banana", "Apple"]);
}

#[tokio::test]
async fn test_unknown_sort_field_falls_back_to_id_order() {
    let (store, _) = website_store();
    store.add(site("b", "one")).await.unwrap();
    store.add(site("a", "two")).await.unwrap();

    assert!(!store.is_valid_sort_field("password"));
    let page = store
        .get_all(ListOptions::new().order_by("password", SortDirection::Asc))
        .await
        .unwrap();
    let ids: Vec<&str> = page.data.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
    let (store, reporter) = website_store();
    let err = store.get_all(ListOptions::new().limit(0)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(reporter.errors().len(), 1);
}

#[tokio::test]
async fn test_update_applies_merge_patch() {
    let (store, _) = website_store();
    store
        .add(site("a", "old title").with_description("to be removed"))
        .await
        .unwrap();

    store
        .update("a", json!({"title": "new title", "description": null}))
        .await
        .unwrap();

    let updated = store.get_by_id("a").await.unwrap().unwrap();
    assert_eq!(updated.title, "new title");
    assert_eq!(updated.description, None);
    assert_eq!(updated.url, "https://a.example.com/");
}

#[tokio::test]
async fn test_update_cannot_change_id() {
    let (store, _) = website_store();
    store.add(site("a", "title")).await.unwrap();

    let err = store.update("a", json!({"id": "b"})).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert!(store.get_by_id("b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_with_mutates_in_place() {
    let (store, _) = website_store();
    store.add(site("a", "title")).await.unwrap();

    let updated = store
        .update_with("a", |w| w.tags.push("rust".to_string()))
        .await
        .unwrap();
    assert_eq!(updated.tags, vec!["rust".to_string()]);
    assert_eq!(store.get_by_id("a").await.unwrap().unwrap().tags.len(), 1);
}

#[tokio::test]
async fn test_missing_targets_are_not_found() {
    let (store, reporter) = website_store();

    let err = store.update("ghost", json!({"title": "x"})).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = store.delete("ghost").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert!(!err.retryable);

    let codes: Vec<ErrorCode> = reporter.errors().iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![ErrorCode::NotFound, ErrorCode::NotFound]);
}

#[tokio::test]
async fn test_find_by_index() {
    let (store, _) = website_store();
    store
        .add(Website::new("https://docs.rs/serde", "serde").with_id("1"))
        .await
        .unwrap();
    store
        .add(Website::new("https://docs.rs/tokio", "tokio").with_id("2"))
        .await
        .unwrap();
    store
        .add(Website::new("https://crates.io/", "crates").with_id("3"))
        .await
        .unwrap();

    let mut ids: Vec<String> = store
        .find_by_index("domain", "docs.rs")
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn test_add_bulk_commits_valid_items_and_reports_failures() {
    let (store, reporter) = website_store();
    let items = vec![site("a", "one"), site("", "invalid"), site("c", "three")];

    let err = store.add_bulk(items).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OperationFailed);

    let context = err.context.expect("bulk failures carry context");
    assert_eq!(context["committed"], json!(["a", "c"]));
    assert_eq!(context["failed"].as_array().map(|f| f.len()), Some(1));

    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(reporter.errors().len(), 1);
}

#[tokio::test]
async fn test_bulk_round_trip() {
    let (store, _) = website_store();
    let outcome = store
        .add_bulk(vec![site("a", "one"), site("b", "two")])
        .await
        .unwrap();
    assert_eq!(outcome.len(), 2);

    let deleted = store
        .delete_bulk(vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(deleted.committed, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_cleanup_removes_records_past_retention() {
    let backend: Arc<dyn CollectionBackend> = Arc::new(MemoryBackend::new());
    let (visits, reporter) = store_on::<Visit>(backend, RetryConfig::no_retry());

    let now = Utc::now();
    visits
        .add(Visit::new("w1", now - ChronoDuration::days(120)).with_id("old"))
        .await
        .unwrap();
    visits
        .add(Visit::new("w1", now - ChronoDuration::days(1)).with_id("fresh"))
        .await
        .unwrap();

    assert_eq!(visits.cleanup().await.unwrap(), 1);
    assert!(visits.get_by_id("old").await.unwrap().is_none());
    assert!(visits.get_by_id("fresh").await.unwrap().is_some());
    assert!(
        reporter
            .infos()
            .contains(&"removed 1 expired visit records".to_string())
    );

    // a second pass has nothing left to do
    assert_eq!(visits.cleanup().await.unwrap(), 0);
}

#[tokio::test]
async fn test_recover_drops_undecodable_records() {
    let backend: Arc<dyn CollectionBackend> = Arc::new(MemoryBackend::new());
    let (store, _) = store_on::<Website>(backend.clone(), RetryConfig::no_retry());
    store.add(site("good", "fine")).await.unwrap();
    backend
        .put("website", "broken", json!({"unexpected": true}), Vec::new())
        .await
        .unwrap();

    assert!(store.get_all(ListOptions::default()).await.is_err());

    assert_eq!(store.recover().await.unwrap(), 1);
    let page = store.get_all(ListOptions::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].id, "good");
}

#[tokio::test(start_paused = true)]
async fn test_reads_retry_transient_backend_failures() {
    let backend = Arc::new(FlakyBackend::new(2));
    let (store, reporter) = store_on::<Website>(backend.clone(), RetryConfig::default());

    let page = store.get_all(ListOptions::default()).await.unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(backend.scans.load(Ordering::SeqCst), 3);
    assert!(reporter.errors().is_empty());
    assert_eq!(reporter.warnings().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reads_give_up_after_max_attempts() {
    let backend = Arc::new(FlakyBackend::new(10));
    let (store, reporter) = store_on::<Website>(backend.clone(), RetryConfig::default());

    let err = store.get_all(ListOptions::default()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RetryExhausted);
    assert_eq!(backend.scans.load(Ordering::SeqCst), 3);

    let cause = err.store_cause().expect("last failure is kept as the cause");
    assert_eq!(cause.code, ErrorCode::OperationFailed);
    assert!(cause.retryable);
    assert_eq!(reporter.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_health_reflects_error_rate() {
    let backend = Arc::new(FlakyBackend::new(100));
    let (store, _) = store_on::<Website>(backend, RetryConfig::no_retry());

    assert!(store.get_health().await.is_healthy);

    for _ in 0..3 {
        let _ = store.get_all(ListOptions::default()).await;
    }
    store.add(site("a", "one")).await.unwrap();

    let health = store.get_health().await;
    assert!(!health.is_healthy);
    assert_eq!(health.performance.total_queries, 4);
    assert_eq!(health.performance.error_count, 3);
    assert!(health.issues.iter().any(|issue| issue.starts_with("Error rate")));
}
