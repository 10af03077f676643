//! Visit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::traits::{IndexEntry, Record, SortValue};

/// One visit to a website. Visits are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: String,

    /// Id of the visited [`Website`](super::Website)
    pub website_id: String,

    pub visited_at: DateTime<Utc>,

    /// Time spent on the page, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Visit {
    pub fn new(website_id: impl Into<String>, visited_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            website_id: website_id.into(),
            visited_at,
            duration_ms: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

impl Record for Visit {
    const COLLECTION: &'static str = "visit";
    const SORT_FIELDS: &'static [&'static str] = &["id", "visited_at", "website_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "visited_at" => Some(self.visited_at.into()),
            "website_id" => Some(self.website_id.as_str().into()),
            _ => None,
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("website_id", &self.website_id)]
    }

    fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("visit record has an empty id"));
        }
        if self.website_id.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "visit '{}' does not reference a website",
                self.id
            )));
        }
        Ok(())
    }

    fn is_retained(&self, horizon: DateTime<Utc>) -> bool {
        self.visited_at >= horizon
    }
}
