//! Snapshot cache over the ranking computation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::decay::{EntityScore, RankingConfig, compute_ranking, local_day};
use super::source::RankingSource;
use crate::storage::errors::StoreResult;
use crate::storage::reporter::ErrorReporter;
use crate::storage::scheduler::{CleanupListener, CleanupReport};

const REFRESH_LABEL: &str = "ranking.refresh";

/// One computed ranking
#[derive(Debug, Clone)]
pub struct RankingSnapshot {
    pub computed_at: DateTime<Utc>,
    pub entries: Vec<EntityScore>,
}

/// Owns the latest ranking snapshot and recomputes it wholesale on demand.
///
/// The snapshot is dropped by [`RankingCache::invalidate`] (call it whenever
/// visits or blocklists change) and rebuilt on the next read. A snapshot
/// taken on an earlier local day is rebuilt too, since its decay is off by
/// at least one day. A failed
/// rebuild yields an empty ranking, is reported, and leaves the cache
/// invalidated so the next read tries again.
pub struct RankingCache {
    source: Arc<dyn RankingSource>,
    config: RankingConfig,
    reporter: Arc<dyn ErrorReporter>,
    snapshot: Option<RankingSnapshot>,
}

impl std::fmt::Debug for RankingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingCache")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl RankingCache {
    pub fn new(
        source: Arc<dyn RankingSource>,
        config: RankingConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            source,
            config,
            reporter,
            snapshot: None,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Whether the next read recomputes
    pub fn is_stale(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn snapshot(&self) -> Option<&RankingSnapshot> {
        self.snapshot.as_ref()
    }

    /// Drop the current snapshot
    pub fn invalidate(&mut self) {
        if self.snapshot.take().is_some() {
            debug!("ranking cache invalidated");
        }
    }

    /// Whether a read at `now` recomputes
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match &self.snapshot {
            Some(snapshot) => {
                let offset = self.config.offset();
                local_day(snapshot.computed_at, &offset) != local_day(now, &offset)
            }
            None => true,
        }
    }

    /// The current ranking, recomputed first if stale at `now`. Empty if the
    /// recomputation fails.
    pub async fn ranking(&mut self, now: DateTime<Utc>) -> Vec<EntityScore> {
        if !self.is_stale_at(now) {
            if let Some(snapshot) = &self.snapshot {
                return snapshot.entries.clone();
            }
        }
        self.refresh(now).await.unwrap_or_default()
    }

    /// The first `n` entries of [`RankingCache::ranking`]
    pub async fn top(&mut self, n: usize, now: DateTime<Utc>) -> Vec<EntityScore> {
        let mut entries = self.ranking(now).await;
        entries.truncate(n);
        entries
    }

    /// Recompute unconditionally
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<EntityScore>> {
        self.snapshot = None;

        match self.compute(now).await {
            Ok(entries) => {
                debug!(entities = entries.len(), "ranking recomputed");
                self.snapshot = Some(RankingSnapshot {
                    computed_at: now,
                    entries: entries.clone(),
                });
                Ok(entries)
            }
            Err(err) => {
                warn!(error = %err, "ranking inputs unavailable, returning empty ranking");
                self.reporter.log_error(REFRESH_LABEL, &err);
                Err(err)
            }
        }
    }

    async fn compute(&self, now: DateTime<Utc>) -> StoreResult<Vec<EntityScore>> {
        // the blocklist is read first: without it nothing may be ranked
        let blocklist = self.source.blocklist().await?;
        let candidates = self.source.candidates().await?;
        let events = self.source.events(self.config.horizon(now)).await?;

        let allowed: Vec<String> = candidates
            .into_iter()
            .filter(|c| !blocklist.is_blocked(&c.url, &c.domain))
            .map(|c| c.id)
            .collect();

        Ok(compute_ranking(&allowed, &events, now, &self.config))
    }
}

#[async_trait]
impl CleanupListener for Mutex<RankingCache> {
    async fn on_cleanup(&self, report: &CleanupReport) {
        if report.removed > 0 {
            self.lock().await.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::blocklist::Blocklist;
    use crate::ranking::decay::VisitEvent;
    use crate::ranking::source::RankCandidate;
    use crate::storage::errors::{ErrorCode, StoreError};
    use crate::storage::reporter::MemoryReporter;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        blocklist_fails: AtomicBool,
        reads: AtomicUsize,
        events: std::sync::Mutex<Vec<VisitEvent>>,
        blocked_domain: Option<String>,
    }

    #[async_trait]
    impl RankingSource for FakeSource {
        async fn candidates(&self) -> StoreResult<Vec<RankCandidate>> {
            Ok(vec![
                RankCandidate {
                    id: "w1".to_string(),
                    url: "https://rust-lang.org".to_string(),
                    domain: "rust-lang.org".to_string(),
                },
                RankCandidate {
                    id: "w2".to_string(),
                    url: "https://news.example.com/today".to_string(),
                    domain: "news.example.com".to_string(),
                },
            ])
        }

        async fn events(&self, _since: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.events.lock().unwrap().clone())
        }

        async fn blocklist(&self) -> StoreResult<Blocklist> {
            if self.blocklist_fails.load(Ordering::SeqCst) {
                return Err(StoreError::operation_failed("blocklist unavailable"));
            }
            let mut blocklist = Blocklist::new();
            if let Some(domain) = &self.blocked_domain {
                blocklist.block_domain(domain);
            }
            Ok(blocklist)
        }
    }

    fn config() -> RankingConfig {
        RankingConfig {
            utc_offset_minutes: Some(0),
            ..Default::default()
        }
    }

    fn events(now: DateTime<Utc>) -> Vec<VisitEvent> {
        vec![
            VisitEvent::new("w1", now - Duration::hours(1)),
            VisitEvent::new("w2", now - Duration::hours(2)),
            VisitEvent::new("w2", now - Duration::hours(3)),
        ]
    }

    #[tokio::test]
    async fn test_snapshot_is_reused_until_invalidated() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::default());
        *source.events.lock().unwrap() = events(now);
        let mut cache = RankingCache::new(source.clone(), config(), Arc::new(MemoryReporter::new()));

        assert!(cache.is_stale());
        let first = cache.ranking(now).await;
        assert_eq!(first[0].entity_id, "w2");
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);

        source
            .events
            .lock()
            .unwrap()
            .extend((0..5).map(|i| VisitEvent::new("w1", now - Duration::minutes(i))));
        assert_eq!(cache.ranking(now).await, first);
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);

        cache.invalidate();
        let second = cache.ranking(now).await;
        assert_eq!(second[0].entity_id, "w1");
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blocklisted_entities_are_excluded() {
        let now = Utc::now();
        let source = Arc::new(FakeSource {
            blocked_domain: Some("example.com".to_string()),
            ..Default::default()
        });
        *source.events.lock().unwrap() = events(now);
        let mut cache = RankingCache::new(source, config(), Arc::new(MemoryReporter::new()));

        let ranking = cache.ranking(now).await;
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].entity_id, "w1");
    }

    #[tokio::test]
    async fn test_blocklist_failure_fails_closed() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::default());
        *source.events.lock().unwrap() = events(now);
        source.blocklist_fails.store(true, Ordering::SeqCst);
        let reporter = Arc::new(MemoryReporter::new());
        let mut cache = RankingCache::new(source.clone(), config(), reporter.clone());

        assert!(cache.ranking(now).await.is_empty());
        assert!(cache.is_stale());
        assert_eq!(reporter.errors().len(), 1);
        assert!(reporter.errors()[0].is(ErrorCode::OperationFailed));

        // recovers on the next read once the blocklist is back
        source.blocklist_fails.store(false, Ordering::SeqCst);
        assert_eq!(cache.ranking(now).await.len(), 2);
        assert!(!cache.is_stale());
    }

    #[tokio::test]
    async fn test_snapshot_expires_on_a_new_day() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::default());
        *source.events.lock().unwrap() = events(now);
        let mut cache = RankingCache::new(source.clone(), config(), Arc::new(MemoryReporter::new()));

        let today = cache.ranking(now).await;
        assert!(!cache.is_stale_at(now));
        assert!(cache.is_stale_at(now + Duration::days(1)));

        let tomorrow = cache.ranking(now + Duration::days(1)).await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
        assert!(tomorrow[0].score < today[0].score);
    }

    #[tokio::test]
    async fn test_cleanup_with_removals_invalidates() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::default());
        let cache = Mutex::new(RankingCache::new(
            source,
            config(),
            Arc::new(MemoryReporter::new()),
        ));
        cache.lock().await.ranking(now).await;

        cache.on_cleanup(&CleanupReport::default()).await;
        assert!(!cache.lock().await.is_stale());

        let report = CleanupReport {
            removed: 3,
            failed: Vec::new(),
        };
        cache.on_cleanup(&report).await;
        assert!(cache.lock().await.is_stale());
    }

    #[tokio::test]
    async fn test_top_truncates() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::default());
        *source.events.lock().unwrap() = events(now);
        let mut cache = RankingCache::new(source, config(), Arc::new(MemoryReporter::new()));

        let top = cache.top(1, now).await;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].entity_id, "w2");
    }
}
