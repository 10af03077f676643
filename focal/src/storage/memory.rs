//! In-memory implementation of [`CollectionBackend`].
//!
//! Collections are kept in ordered maps behind a single `RwLock`, so a batch
//! holds the write guard for its whole duration and no other write can
//! interleave with it.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::errors::{BackendError, BackendResult};
use super::traits::{CollectionBackend, IndexEntry, WriteOp};

#[derive(Debug, Default)]
struct CollectionData {
    records: BTreeMap<String, serde_json::Value>,
    /// index name -> value -> ids
    indexes: HashMap<String, HashMap<String, BTreeSet<String>>>,
    /// id -> index entries currently registered for it
    entries: HashMap<String, Vec<IndexEntry>>,
}

impl CollectionData {
    fn put(&mut self, id: &str, value: serde_json::Value, indexes: Vec<IndexEntry>) {
        self.unindex(id);
        for entry in &indexes {
            self.indexes
                .entry(entry.index.clone())
                .or_default()
                .entry(entry.value.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.entries.insert(id.to_string(), indexes);
        self.records.insert(id.to_string(), value);
    }

    fn delete(&mut self, id: &str) -> bool {
        self.unindex(id);
        self.records.remove(id).is_some()
    }

    fn unindex(&mut self, id: &str) {
        let Some(previous) = self.entries.remove(id) else {
            return;
        };
        for entry in previous {
            if let Some(values) = self.indexes.get_mut(&entry.index) {
                if let Some(ids) = values.get_mut(&entry.value) {
                    ids.remove(id);
                    if ids.is_empty() {
                        values.remove(&entry.value);
                    }
                }
            }
        }
    }
}

/// Embedded object store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every collection that has been written to
    pub async fn collections(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CollectionBackend for MemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<serde_json::Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|data| data.records.get(id))
            .cloned())
    }

    async fn scan(&self, collection: &str) -> BackendResult<Vec<(String, serde_json::Value)>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|data| {
                data.records
                    .iter()
                    .map(|(id, value)| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> BackendResult<usize> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|data| data.records.len())
            .unwrap_or(0))
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        value: serde_json::Value,
        indexes: Vec<IndexEntry>,
    ) -> BackendResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .put(id, value, indexes);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|data| data.delete(id))
            .unwrap_or(false))
    }

    async fn batch(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
    ) -> BackendResult<Vec<BackendResult<()>>> {
        let mut collections = self.collections.write().await;
        let data = collections.entry(collection.to_string()).or_default();

        let results = ops
            .into_iter()
            .map(|op| match op {
                WriteOp::Put { id, value, indexes } => {
                    data.put(&id, value, indexes);
                    Ok(())
                }
                WriteOp::Delete { id } => {
                    if data.delete(&id) {
                        Ok(())
                    } else {
                        Err(BackendError::NotFound(format!("{}/{}", collection, id)))
                    }
                }
            })
            .collect();

        Ok(results)
    }

    async fn index_lookup(
        &self,
        collection: &str,
        index: &str,
        value: &str,
    ) -> BackendResult<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|data| data.indexes.get(index))
            .and_then(|values| values.get(value))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, collection: &str) -> BackendResult<()> {
        let mut collections = self.collections.write().await;
        collections.remove(collection);
        Ok(())
    }
}
