//! Building a relevance corpus from persisted records

use async_trait::async_trait;
use tracing::{debug, warn};

use super::RelevanceConfig;
use super::tfidf::{Document, Tfidf};
use super::tokenizer::mark_proper_noun;
use crate::models::{DriveDocument, Person, Segment, Website};
use crate::storage::collection::CollectionStore;
use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::models::ListOptions;
use crate::storage::traits::Record;

/// A record that contributes text to the relevance corpus
pub trait Indexable: Record {
    /// Free text of the record
    fn document_text(&self) -> String;

    /// Grouping key; defaults to the record id
    fn document_key(&self) -> String {
        self.id().to_string()
    }

    /// Corpus partition of this record type
    fn document_type() -> &'static str {
        Self::COLLECTION
    }

    fn to_document(&self) -> Document {
        Document::new(self.id(), self.document_key(), self.document_text())
            .with_type(Self::document_type())
    }
}

impl Indexable for Website {
    fn document_text(&self) -> String {
        let mut parts = vec![self.title.clone()];
        parts.extend(self.description.clone());
        parts.extend(self.tags.iter().cloned());
        parts.join(" ")
    }
}

impl Indexable for Segment {
    fn document_text(&self) -> String {
        let mut parts = vec![self.title.clone()];
        parts.extend(self.description.clone());
        // attendees without an @ are names; keep them as single terms
        parts.extend(
            self.attendees
                .iter()
                .filter(|a| !a.contains('@'))
                .map(|a| mark_proper_noun(a)),
        );
        parts.extend(self.tags.iter().cloned());
        parts.join(" ")
    }
}

impl Indexable for Person {
    fn document_text(&self) -> String {
        let mut parts = vec![mark_proper_noun(&self.name)];
        parts.extend(self.notes.clone());
        parts.join(" ")
    }
}

impl Indexable for DriveDocument {
    fn document_text(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.tags.iter().cloned());
        parts.join(" ")
    }
}

/// Supplier of relevance documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Name used in logs
    fn source_name(&self) -> &str;

    async fn documents(&self) -> StoreResult<Vec<Document>>;
}

#[async_trait]
impl<T: Indexable> DocumentSource for CollectionStore<T> {
    fn source_name(&self) -> &str {
        T::COLLECTION
    }

    async fn documents(&self) -> StoreResult<Vec<Document>> {
        let page = self.get_all(ListOptions::default()).await?;
        Ok(page.data.iter().map(Indexable::to_document).collect())
    }
}

/// Fixed set of documents
#[derive(Debug, Clone, Default)]
pub struct StaticDocuments {
    name: String,
    documents: Vec<Document>,
}

impl StaticDocuments {
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }
}

#[async_trait]
impl DocumentSource for StaticDocuments {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn documents(&self) -> StoreResult<Vec<Document>> {
        Ok(self.documents.clone())
    }
}

/// Engine built by [`Corpus::load`] and the source failures it absorbed
#[derive(Debug)]
pub struct Corpus {
    pub engine: Tfidf,

    /// One entry per failed source; those sources contributed nothing
    pub errors: Vec<StoreError>,
}

impl Corpus {
    /// Build a fresh engine from every source, in order.
    ///
    /// A source that fails contributes no documents; its error is kept in
    /// [`Corpus::errors`] and the build continues.
    pub async fn load(sources: &[&dyn DocumentSource], config: &RelevanceConfig) -> Self {
        let mut engine = Tfidf::new();
        let mut errors = Vec::new();

        for source in sources {
            match source.documents().await {
                Ok(documents) => {
                    debug!(
                        source = source.source_name(),
                        documents = documents.len(),
                        "loaded relevance documents"
                    );
                    engine.extend(documents, config.restore_cache_on_add);
                }
                Err(err) => {
                    warn!(
                        source = source.source_name(),
                        error = %err,
                        "relevance source failed, continuing without it"
                    );
                    errors.push(err);
                }
            }
        }

        Self { engine, errors }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Top terms across the corpus, rendered, capped at `config.max_terms`
    pub fn suggest_tags(&mut self, config: &RelevanceConfig) -> Vec<String> {
        self.engine.suggest_tags(config.max_terms)
    }
}
