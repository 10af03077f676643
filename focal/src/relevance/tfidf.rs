//! Incremental TF-IDF over an in-memory corpus.
//!
//! `idf(t) = 1 + ln(N / (1 + n_t))` where `N` is the number of documents and
//! `n_t` the number containing `t`. An empty corpus is treated as `N = 1,
//! n_t = 0`. `tf` is the raw count of a term inside one document.
//!
//! The IDF cache is owned by the engine and is either wiped (lazy) or
//! recomputed in place (eager) whenever the corpus changes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use super::tokenizer::{is_reserved, render_term, tokenize};

/// Document type used when none is given
pub const DEFAULT_DOC_TYPE: &str = "default";

/// One unit of text fed to the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,

    /// Grouping key; several documents may share one
    pub key: String,

    pub text: String,

    /// Corpus partition, e.g. "website" or "segment"; not part of identity
    pub doc_type: String,
}

impl Document {
    pub fn new(id: impl Into<String>, key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            text: text.into(),
            doc_type: DEFAULT_DOC_TYPE.to_string(),
        }
    }

    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = doc_type.into();
        self
    }
}

/// A term together with its score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermScore {
    pub term: String,
    pub tfidf: f64,
}

impl TermScore {
    /// The term with proper-noun markers turned back into spaces
    pub fn rendered(&self) -> String {
        render_term(&self.term)
    }
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: Document,
    terms: HashMap<String, usize>,
}

impl IndexedDocument {
    fn new(document: Document) -> Self {
        let mut terms = HashMap::new();
        for token in tokenize(&document.text) {
            *terms.entry(token).or_insert(0) += 1;
        }
        Self { document, terms }
    }

    fn tf(&self, term: &str) -> usize {
        self.terms.get(term).copied().unwrap_or(0)
    }
}

/// TF-IDF engine owning one corpus and its IDF cache
#[derive(Debug, Clone, Default)]
pub struct Tfidf {
    documents: Vec<IndexedDocument>,
    idf_cache: HashMap<String, f64>,
}

impl Tfidf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in insertion order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().map(|d| &d.document)
    }

    /// Append a document built from `text` under `key`.
    ///
    /// With `restore_cache` every cached term is recomputed against the new
    /// corpus; otherwise the cache is wiped.
    pub fn add_document(&mut self, text: &str, key: &str, restore_cache: bool) -> &Document {
        let document = Document::new(Uuid::new_v4().to_string(), key, text);
        self.add(document, restore_cache)
    }

    /// Append `document`; see [`Tfidf::add_document`] for `restore_cache`
    pub fn add(&mut self, document: Document, restore_cache: bool) -> &Document {
        self.documents.push(IndexedDocument::new(document));
        self.after_mutation(restore_cache);
        let index = self.documents.len() - 1;
        &self.documents[index].document
    }

    /// Append many documents, invalidating the cache once
    pub fn extend<I>(&mut self, documents: I, restore_cache: bool)
    where
        I: IntoIterator<Item = Document>,
    {
        self.documents
            .extend(documents.into_iter().map(IndexedDocument::new));
        self.after_mutation(restore_cache);
    }

    /// Drop every cached IDF value
    pub fn invalidate_cache(&mut self) {
        self.idf_cache.clear();
    }

    /// Recompute every cached IDF value against the current corpus
    pub fn restore_cache(&mut self) {
        let terms: Vec<String> = self.idf_cache.keys().cloned().collect();
        for term in terms {
            let value = self.compute_idf(&term);
            self.idf_cache.insert(term, value);
        }
    }

    /// Cached IDF of `term`, if present
    pub fn cached_idf(&self, term: &str) -> Option<f64> {
        self.idf_cache.get(term).copied()
    }

    pub fn cache_len(&self) -> usize {
        self.idf_cache.len()
    }

    /// IDF of `term`, served from the cache unless `force_recompute`
    pub fn idf(&mut self, term: &str, force_recompute: bool) -> f64 {
        if !force_recompute {
            if let Some(value) = self.idf_cache.get(term) {
                return *value;
            }
        }
        let value = self.compute_idf(term);
        self.idf_cache.insert(term.to_string(), value);
        value
    }

    /// Sum of `tf * idf` over the tokens of `phrase` and every document
    /// carrying `key`. Non-finite IDF values count as zero.
    pub fn tfidf(&mut self, phrase: &str, key: &str) -> f64 {
        let tokens = tokenize(phrase);
        let mut total = 0.0;
        for token in &tokens {
            let idf = finite_or_zero(self.idf(token, false));
            let tf: usize = self
                .documents
                .iter()
                .filter(|d| d.document.key == key)
                .map(|d| d.tf(token))
                .sum();
            total += tf as f64 * idf;
        }
        total
    }

    /// Score of `phrase` against each document, in corpus order
    pub fn tfidfs(&mut self, phrase: &str) -> Vec<f64> {
        let tokens = tokenize(phrase);
        let idfs: Vec<f64> = tokens
            .iter()
            .map(|token| finite_or_zero(self.idf(token, false)))
            .collect();

        self.documents
            .iter()
            .map(|d| {
                tokens
                    .iter()
                    .zip(&idfs)
                    .map(|(token, idf)| d.tf(token) as f64 * idf)
                    .sum()
            })
            .collect()
    }

    /// Terms of every document carrying `key`, deduplicated, highest first
    pub fn list_terms(&mut self, key: &str) -> Vec<TermScore> {
        let totals = self.term_totals(|d| d.key == key);
        self.rank(totals, None)
    }

    /// Corpus-wide ranking: each term scored by its summed tf-idf over all
    /// documents. Reserved terms are excluded.
    pub fn list_terms_with_value(&mut self, max_terms: Option<usize>) -> Vec<TermScore> {
        let totals = self.term_totals(|_| true);
        self.rank(totals, max_terms)
    }

    /// As [`Tfidf::list_terms_with_value`], restricted to one document type
    pub fn list_terms_of_type(&mut self, doc_type: &str, max_terms: Option<usize>) -> Vec<TermScore> {
        let totals = self.term_totals(|d| d.doc_type == doc_type);
        self.rank(totals, max_terms)
    }

    /// Top corpus terms rendered for display
    pub fn suggest_tags(&mut self, max_tags: usize) -> Vec<String> {
        self.list_terms_with_value(Some(max_tags))
            .iter()
            .map(TermScore::rendered)
            .collect()
    }

    fn after_mutation(&mut self, restore_cache: bool) {
        if restore_cache {
            self.restore_cache();
        } else {
            self.invalidate_cache();
        }
    }

    fn compute_idf(&self, term: &str) -> f64 {
        let (corpus_size, containing) = if self.documents.is_empty() {
            (1.0, 0.0)
        } else {
            let containing = self.documents.iter().filter(|d| d.tf(term) > 0).count();
            (self.documents.len() as f64, containing as f64)
        };
        1.0 + (corpus_size / (1.0 + containing)).ln()
    }

    /// term -> summed tf over the documents selected by `filter`
    fn term_totals<F>(&self, filter: F) -> HashMap<String, usize>
    where
        F: Fn(&Document) -> bool,
    {
        let mut totals: HashMap<String, usize> = HashMap::new();
        for doc in self.documents.iter().filter(|d| filter(&d.document)) {
            for (term, count) in &doc.terms {
                if is_reserved(term) {
                    continue;
                }
                *totals.entry(term.clone()).or_insert(0) += count;
            }
        }
        totals
    }

    fn rank(&mut self, totals: HashMap<String, usize>, max_terms: Option<usize>) -> Vec<TermScore> {
        let mut scores: Vec<TermScore> = totals
            .into_iter()
            .map(|(term, tf)| {
                let idf = finite_or_zero(self.idf(&term, false));
                TermScore {
                    tfidf: tf as f64 * idf,
                    term,
                }
            })
            .collect();

        scores.sort_by(|a, b| {
            b.tfidf
                .partial_cmp(&a.tfidf)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.term.cmp(&b.term))
        });
        if let Some(max) = max_terms {
            scores.truncate(max);
        }
        scores
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
