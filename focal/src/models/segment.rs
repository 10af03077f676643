//! Calendar segments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::traits::{Record, SortValue};

/// A block of calendar time (meeting, focus block, event)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Attendee names or emails
    #[serde(default)]
    pub attendees: Vec<String>,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl Segment {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            attendees: Vec::new(),
            start,
            end,
            tags: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = attendees.into_iter().map(Into::into).collect();
        self
    }
}

impl Record for Segment {
    const COLLECTION: &'static str = "segment";
    const SORT_FIELDS: &'static [&'static str] = &["id", "title", "start", "end"];

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "title" => Some(self.title.as_str().into()),
            "start" => Some(self.start.into()),
            "end" => Some(self.end.into()),
            _ => None,
        }
    }

    fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("segment record has an empty id"));
        }
        if self.end < self.start {
            return Err(StoreError::validation(format!(
                "segment '{}' ends before it starts",
                self.id
            )));
        }
        Ok(())
    }

    fn is_retained(&self, horizon: DateTime<Utc>) -> bool {
        self.end >= horizon
    }
}
