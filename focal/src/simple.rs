//! Simplified Focal API
//!
//! [`Focal`] wires one collection store per record type, the ranking cache
//! and the cleanup scheduler on top of a single backend, so the common flows
//! (record a visit, block a domain, ask for the top websites, suggest tags)
//! take one call each.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::Result;
use crate::config::{ConfigBuilder, ConfigLoader, FocalConfig, validate_config};
use crate::models::{BlockRule, DriveDocument, Person, Segment, Visit, Website};
use crate::ranking::{EntityScore, RankingCache, StoreRankingSource};
use crate::relevance::{Corpus, DocumentSource};
use crate::storage::{
    Cleanable, CleanupListener, CleanupReport, CleanupScheduler, CollectionBackend, CollectionStore, ErrorReporter,
    Record, Resilience, StoreHealth, TracingReporter, memory_backend,
};

/// All Focal stores over one backend
///
/// # Examples
///
/// ```rust,no_run
/// use focal::Focal;
///
/// async fn example() -> focal::Result<()> {
///     let focal = Focal::for_testing()?;
///     let site = focal::models::Website::new("https://docs.rs/tokio", "tokio docs");
///     let id = site.id.clone();
///     focal.websites().add(site).await?;
///     focal.record_visit(&id, chrono::Utc::now()).await?;
///
///     let top = focal.top_websites(10, chrono::Utc::now()).await;
///     assert_eq!(top[0].entity_id, id);
///     Ok(())
/// }
/// ```
pub struct Focal {
    config: FocalConfig,
    reporter: Arc<dyn ErrorReporter>,
    websites: Arc<CollectionStore<Website>>,
    visits: Arc<CollectionStore<Visit>>,
    segments: Arc<CollectionStore<Segment>>,
    people: Arc<CollectionStore<Person>>,
    documents: Arc<CollectionStore<DriveDocument>>,
    blocklist: Arc<CollectionStore<BlockRule>>,
    ranking: Arc<Mutex<RankingCache>>,
    scheduler: Option<CleanupScheduler>,
}

impl std::fmt::Debug for Focal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Focal")
            .field("config", &self.config)
            .field("cleanup_running", &self.scheduler.is_some())
            .finish_non_exhaustive()
    }
}

impl Focal {
    /// Load configuration from default files and `FOCAL_` environment
    /// variables, initialize logging, and open in-memory stores.
    pub fn new() -> Result<Self> {
        let config = ConfigLoader::new()
            .load_default_files()
            .load_env()
            .extract()?;
        crate::init(&config)?;
        Self::with_backend(memory_backend(), config)
    }

    /// In-memory stores with the testing preset. Logging is left alone.
    pub fn for_testing() -> Result<Self> {
        let config = ConfigBuilder::testing().build()?;
        Self::with_backend(memory_backend(), config)
    }

    /// Open every store on `backend`, reporting through `tracing`
    pub fn with_backend(backend: Arc<dyn CollectionBackend>, config: FocalConfig) -> Result<Self> {
        Self::with_reporter(backend, config, Arc::new(TracingReporter))
    }

    /// Open every store on `backend` with a custom error reporter
    pub fn with_reporter(
        backend: Arc<dyn CollectionBackend>,
        config: FocalConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        validate_config(&config)?;

        let resilience = Resilience::new(config.retry.clone(), Arc::clone(&reporter));
        let websites = Arc::new(open(&backend, &config, &resilience));
        let visits = Arc::new(open(&backend, &config, &resilience));
        let blocklist: Arc<CollectionStore<BlockRule>> =
            Arc::new(open(&backend, &config, &resilience));

        let source = StoreRankingSource::new(
            Arc::clone(&websites),
            Arc::clone(&visits),
            blocklist.clone(),
        );
        let ranking = RankingCache::new(
            Arc::new(source),
            config.ranking.clone(),
            Arc::clone(&reporter),
        );

        tracing::debug!("focal stores opened");

        Ok(Self {
            segments: Arc::new(open(&backend, &config, &resilience)),
            people: Arc::new(open(&backend, &config, &resilience)),
            documents: Arc::new(open(&backend, &config, &resilience)),
            config,
            reporter,
            websites,
            visits,
            blocklist,
            ranking: Arc::new(Mutex::new(ranking)),
            scheduler: None,
        })
    }

    pub fn config(&self) -> &FocalConfig {
        &self.config
    }

    pub fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    pub fn websites(&self) -> &CollectionStore<Website> {
        &self.websites
    }

    pub fn visits(&self) -> &CollectionStore<Visit> {
        &self.visits
    }

    pub fn segments(&self) -> &CollectionStore<Segment> {
        &self.segments
    }

    pub fn people(&self) -> &CollectionStore<Person> {
        &self.people
    }

    pub fn documents(&self) -> &CollectionStore<DriveDocument> {
        &self.documents
    }

    pub fn blocklist(&self) -> &CollectionStore<BlockRule> {
        &self.blocklist
    }

    /// Store a visit to `website_id` and invalidate the ranking
    pub async fn record_visit(&self, website_id: &str, at: DateTime<Utc>) -> Result<Visit> {
        let visit = Visit::new(website_id, at);
        self.visits.add(visit.clone()).await?;
        self.invalidate_ranking().await;
        Ok(visit)
    }

    /// Block a domain and all of its subdomains
    pub async fn block_domain(&self, domain: &str) -> Result<BlockRule> {
        self.add_rule(BlockRule::domain(domain)).await
    }

    /// Block every URL under `site`
    pub async fn block_site(&self, site: &str) -> Result<BlockRule> {
        self.add_rule(BlockRule::site(site)).await
    }

    pub async fn unblock(&self, rule_id: &str) -> Result<()> {
        self.blocklist.delete(rule_id).await?;
        self.invalidate_ranking().await;
        Ok(())
    }

    async fn add_rule(&self, rule: BlockRule) -> Result<BlockRule> {
        self.blocklist.add(rule.clone()).await?;
        self.invalidate_ranking().await;
        Ok(rule)
    }

    /// Drop the cached ranking. Needed after writing visits or blocklist
    /// rules through the stores directly.
    pub async fn invalidate_ranking(&self) {
        self.ranking.lock().await.invalidate();
    }

    /// Websites ranked by decayed visit frequency, best first. Empty when the
    /// ranking cannot be computed.
    pub async fn ranked_websites(&self, now: DateTime<Utc>) -> Vec<EntityScore> {
        self.ranking.lock().await.ranking(now).await
    }

    pub async fn top_websites(&self, n: usize, now: DateTime<Utc>) -> Vec<EntityScore> {
        self.ranking.lock().await.top(n, now).await
    }

    /// Build a fresh corpus over every text-bearing store
    pub async fn corpus(&self) -> Corpus {
        let sources: [&dyn DocumentSource; 4] = [
            &*self.websites,
            &*self.segments,
            &*self.people,
            &*self.documents,
        ];
        Corpus::load(&sources, &self.config.relevance).await
    }

    /// Tags suggested from the whole corpus
    pub async fn suggest_tags(&self) -> Vec<String> {
        self.corpus().await.suggest_tags(&self.config.relevance)
    }

    fn cleanup_targets(&self) -> Vec<Arc<dyn Cleanable>> {
        let websites: Arc<dyn Cleanable> = self.websites.clone();
        let visits: Arc<dyn Cleanable> = self.visits.clone();
        let segments: Arc<dyn Cleanable> = self.segments.clone();
        let people: Arc<dyn Cleanable> = self.people.clone();
        let documents: Arc<dyn Cleanable> = self.documents.clone();
        let blocklist: Arc<dyn Cleanable> = self.blocklist.clone();
        vec![websites, visits, segments, people, documents, blocklist]
    }

    /// Run retention cleanup over every store now
    pub async fn cleanup_now(&self) -> CleanupReport {
        let report = CleanupScheduler::run_once(&self.cleanup_targets()).await;
        self.ranking.on_cleanup(&report).await;
        report
    }

    /// Start scheduled cleanup on the current runtime. No-op when already
    /// running. Passes that remove records invalidate the ranking.
    pub fn start_cleanup(&mut self) {
        if self.scheduler.is_some() {
            return;
        }
        let listener: Arc<dyn CleanupListener> = self.ranking.clone();
        self.scheduler = Some(CleanupScheduler::spawn(
            self.cleanup_targets(),
            self.config.store.cleanup_interval,
            self.config.store.cleanup_initial_delay,
            Some(listener),
        ));
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Health of every store, in collection order
    pub async fn health(&self) -> Vec<(&'static str, StoreHealth)> {
        vec![
            (Website::COLLECTION, self.websites.get_health().await),
            (Visit::COLLECTION, self.visits.get_health().await),
            (Segment::COLLECTION, self.segments.get_health().await),
            (Person::COLLECTION, self.people.get_health().await),
            (DriveDocument::COLLECTION, self.documents.get_health().await),
            (BlockRule::COLLECTION, self.blocklist.get_health().await),
        ]
    }

    /// Stop scheduled cleanup, waiting for an in-flight pass
    pub async fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
    }
}

fn open<T: Record>(
    backend: &Arc<dyn CollectionBackend>,
    config: &FocalConfig,
    resilience: &Resilience,
) -> CollectionStore<T> {
    CollectionStore::new(Arc::clone(backend), config.store.clone(), resilience.clone())
}
