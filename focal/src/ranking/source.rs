//! Inputs of the ranking cache

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::blocklist::{Blocklist, BlocklistProvider};
use super::decay::VisitEvent;
use crate::models::{Visit, Website};
use crate::storage::collection::CollectionStore;
use crate::storage::errors::StoreResult;
use crate::storage::models::ListOptions;

/// An entity that may appear in the ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankCandidate {
    pub id: String,
    pub url: String,
    pub domain: String,
}

impl From<&Website> for RankCandidate {
    fn from(website: &Website) -> Self {
        Self {
            id: website.id.clone(),
            url: website.url.clone(),
            domain: website.domain.clone(),
        }
    }
}

/// Everything the ranking cache reads. Any failure makes the whole ranking
/// fail closed.
#[async_trait]
pub trait RankingSource: Send + Sync {
    /// Entities eligible for ranking, before blocklist filtering
    async fn candidates(&self) -> StoreResult<Vec<RankCandidate>>;

    /// Visit events at or after `since`
    async fn events(&self, since: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>>;

    async fn blocklist(&self) -> StoreResult<Blocklist>;
}

/// Ranks websites by their visits, filtered through a blocklist provider
#[derive(Clone)]
pub struct StoreRankingSource {
    websites: Arc<CollectionStore<Website>>,
    visits: Arc<CollectionStore<Visit>>,
    blocklist: Arc<dyn BlocklistProvider>,
}

impl std::fmt::Debug for StoreRankingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRankingSource")
            .field("websites", &self.websites.collection())
            .field("visits", &self.visits.collection())
            .finish_non_exhaustive()
    }
}

impl StoreRankingSource {
    pub fn new(
        websites: Arc<CollectionStore<Website>>,
        visits: Arc<CollectionStore<Visit>>,
        blocklist: Arc<dyn BlocklistProvider>,
    ) -> Self {
        Self {
            websites,
            visits,
            blocklist,
        }
    }
}

#[async_trait]
impl RankingSource for StoreRankingSource {
    async fn candidates(&self) -> StoreResult<Vec<RankCandidate>> {
        let page = self.websites.get_all(ListOptions::default()).await?;
        Ok(page.data.iter().map(RankCandidate::from).collect())
    }

    async fn events(&self, since: DateTime<Utc>) -> StoreResult<Vec<VisitEvent>> {
        let page = self.visits.get_all(ListOptions::default()).await?;
        Ok(page
            .data
            .iter()
            .filter(|visit| visit.visited_at >= since)
            .map(VisitEvent::from)
            .collect())
    }

    async fn blocklist(&self) -> StoreResult<Blocklist> {
        self.blocklist.blocklist().await
    }
}
