//! Persisted blocklist entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::traits::{IndexEntry, Record, SortValue};

/// What a [`BlockRule`] pattern is matched against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// A domain; also blocks every subdomain
    Domain,
    /// A URL prefix
    Site,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain => write!(f, "domain"),
            Self::Site => write!(f, "site"),
        }
    }
}

/// One entry of the user's blocklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockRule {
    pub id: String,
    pub kind: BlockKind,
    pub pattern: String,
}

impl BlockRule {
    pub fn domain(pattern: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: BlockKind::Domain,
            pattern: pattern.into(),
        }
    }

    pub fn site(pattern: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: BlockKind::Site,
            pattern: pattern.into(),
        }
    }
}

impl Record for BlockRule {
    const COLLECTION: &'static str = "blocklist";
    const SORT_FIELDS: &'static [&'static str] = &["id", "pattern"];

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "pattern" => Some(self.pattern.as_str().into()),
            _ => None,
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("kind", self.kind.to_string())]
    }

    fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("blocklist record has an empty id"));
        }
        if self.pattern.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "blocklist rule '{}' has an empty pattern",
                self.id
            )));
        }
        Ok(())
    }
}
