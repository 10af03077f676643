//! Term relevance over record text
//!
//! A [`Tfidf`] engine turns free text into ranked terms; [`Corpus`] builds one
//! from collection stores and other [`DocumentSource`]s.

pub mod corpus;
pub mod tfidf;
pub mod tokenizer;

pub use corpus::{Corpus, DocumentSource, Indexable, StaticDocuments};
pub use tfidf::{Document, TermScore, Tfidf};
pub use tokenizer::{mark_proper_noun, render_term, tokenize};

use serde::{Deserialize, Serialize};

/// Relevance engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Number of terms returned by tag suggestion
    pub max_terms: usize,

    /// Recompute cached IDF values on every add instead of wiping them
    pub restore_cache_on_add: bool,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            max_terms: 20,
            restore_cache_on_add: false,
        }
    }
}

impl RelevanceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_terms == 0 {
            return Err("max_terms must be greater than 0".to_string());
        }
        Ok(())
    }
}
