//! Trait definitions for storage components in Focal

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::storage::errors::{BackendResult, StoreError, StoreResult};

/// Value used to order records by an allow-listed field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Text(String),
    Integer(i64),
    Time(DateTime<Utc>),
}

impl From<&str> for SortValue {
    fn from(value: &str) -> Self {
        SortValue::Text(value.to_lowercase())
    }
}

impl From<DateTime<Utc>> for SortValue {
    fn from(value: DateTime<Utc>) -> Self {
        SortValue::Time(value)
    }
}

impl From<i64> for SortValue {
    fn from(value: i64) -> Self {
        SortValue::Integer(value)
    }
}

/// One secondary-index entry: `index` maps `value` to the record's id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub index: String,
    pub value: String,
}

impl IndexEntry {
    pub fn new(index: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            value: value.into(),
        }
    }
}

/// A single write inside a backend batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert or replace a record and its index entries
    Put {
        id: String,
        value: serde_json::Value,
        indexes: Vec<IndexEntry>,
    },

    /// Remove a record and its index entries
    Delete { id: String },
}

impl WriteOp {
    pub fn id(&self) -> &str {
        match self {
            WriteOp::Put { id, .. } | WriteOp::Delete { id } => id,
        }
    }
}

/// Keyed-collection persistence primitive (the embedded object store).
///
/// Values are stored as JSON documents keyed by id inside a named collection.
#[async_trait]
pub trait CollectionBackend: Send + Sync + Debug + 'static {
    /// Fetch one value
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<serde_json::Value>>;

    /// Fetch every `(id, value)` pair of a collection
    async fn scan(&self, collection: &str) -> BackendResult<Vec<(String, serde_json::Value)>>;

    /// Number of values in a collection
    async fn count(&self, collection: &str) -> BackendResult<usize>;

    /// Insert or replace a value
    async fn put(
        &self,
        collection: &str,
        id: &str,
        value: serde_json::Value,
        indexes: Vec<IndexEntry>,
    ) -> BackendResult<()>;

    /// Remove a value; returns whether it existed
    async fn delete(&self, collection: &str, id: &str) -> BackendResult<bool>;

    /// Apply `ops` as one unit of work: no other write to the collection
    /// interleaves. Returns one result per op, in order.
    async fn batch(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
    ) -> BackendResult<Vec<BackendResult<()>>>;

    /// Ids whose `index` entry equals `value`
    async fn index_lookup(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> BackendResult<Vec<String>>;

    /// Remove every value of a collection
    async fn clear(&self, collection: &str) -> BackendResult<()>;

    /// Check if the backend is healthy and available
    async fn health_check(&self) -> BackendResult<bool> {
        Ok(true)
    }
}

/// A persisted domain entity living in exactly one collection
pub trait Record: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Name of the owning collection
    const COLLECTION: &'static str;

    /// Fields accepted by `order_by`
    const SORT_FIELDS: &'static [&'static str];

    /// Identifier, unique within the collection
    fn id(&self) -> &str;

    /// Value of an allow-listed sort field
    fn sort_value(&self, field: &str) -> Option<SortValue>;

    /// Secondary-index entries for this record
    fn index_entries(&self) -> Vec<IndexEntry> {
        Vec::new()
    }

    /// Per-entity validation hook, run before every write
    fn validate(&self) -> StoreResult<()> {
        if self.id().trim().is_empty() {
            return Err(StoreError::validation(format!(
                "{} record has an empty id",
                Self::COLLECTION
            )));
        }
        Ok(())
    }

    /// Whether the record should survive a cleanup run with the given horizon
    fn is_retained(&self, _horizon: DateTime<Utc>) -> bool {
        true
    }

    /// Whether `field` may be used for ordering
    fn is_valid_sort_field(field: &str) -> bool {
        Self::SORT_FIELDS.contains(&field)
    }
}
