//! Cloud drive documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::traits::{IndexEntry, Record, SortValue};

/// A document fetched from the user's drive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveDocument {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub mime_type: String,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl DriveDocument {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            url: None,
            mime_type: mime_type.into(),
            updated_at: Utc::now(),
            tags: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }
}

impl Record for DriveDocument {
    const COLLECTION: &'static str = "drive_document";
    const SORT_FIELDS: &'static [&'static str] = &["id", "name", "updated_at"];

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "updated_at" => Some(self.updated_at.into()),
            _ => None,
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("mime_type", &self.mime_type)]
    }

    fn is_retained(&self, horizon: DateTime<Utc>) -> bool {
        self.updated_at >= horizon
    }
}
