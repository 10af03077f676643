//! Website records and URL helpers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::traits::{IndexEntry, Record, SortValue};

/// A website the user has visited at least once
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Website {
    /// Unique identifier
    pub id: String,

    /// Full URL as first seen
    pub url: String,

    /// Host of `url`, lowercased and without a leading `www.`
    pub domain: String,

    /// Page title
    pub title: String,

    /// Optional description (meta description or user note)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User or suggested tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// When the website was first recorded
    pub created_at: DateTime<Utc>,
}

impl Website {
    /// Create a website with a fresh id; the domain is derived from `url`
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4().to_string(),
            domain: domain_of(&url),
            url,
            title: title.into(),
            description: None,
            tags: Vec::new(),
            created_at: Utc::now(),
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

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

impl Record for Website {
    const COLLECTION: &'static str = "website";
    const SORT_FIELDS: &'static [&'static str] = &["id", "url", "domain", "title", "created_at"];

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "url" => Some(self.url.as_str().into()),
            "domain" => Some(self.domain.as_str().into()),
            "title" => Some(self.title.as_str().into()),
            "created_at" => Some(self.created_at.into()),
            _ => None,
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::new("domain", &self.domain)]
    }

    fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("website record has an empty id"));
        }
        if self.url.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "website '{}' has an empty url",
                self.id
            )));
        }
        if self.domain.is_empty() {
            return Err(StoreError::validation(format!(
                "website '{}' has no domain",
                self.id
            )));
        }
        Ok(())
    }
}

/// Host part of `url`: lowercased, without scheme, credentials, port or a
/// leading `www.`
pub fn domain_of(url: &str) -> String {
    let rest = strip_scheme(url.trim());
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}

/// Canonical form used for URL prefix comparisons: no scheme, no `www.`,
/// lowercase host, no fragment, no trailing slash
pub fn normalize_url(url: &str) -> String {
    let rest = strip_scheme(url.trim());
    let rest = rest.split('#').next().unwrap_or(rest);

    let (host, path) = match rest.find(['/', '?']) {
        Some(split) => rest.split_at(split),
        None => (rest, ""),
    };
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut normalized = format!("{}{}", host, path);
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn strip_scheme(url: &str) -> &str {
    match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.Example.com/path?q=1"), "example.com");
        assert_eq!(domain_of("http://user:pw@docs.rs:8080/tokio"), "docs.rs");
        assert_eq!(domain_of("news.ycombinator.com"), "news.ycombinator.com");
        assert_eq!(domain_of(""), "");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("HTTPS://WWW.Example.com/Docs/#intro"),
            "example.com/Docs"
        );
        assert_eq!(normalize_url("example.com/"), "example.com");
        assert_eq!(
            normalize_url("https://example.com?q=1"),
            "example.com?q=1"
        );
    }

    #[test]
    fn test_new_derives_domain() {
        let site = Website::new("https://www.rust-lang.org/learn", "Learn Rust");
        assert_eq!(site.domain, "rust-lang.org");
        assert!(!site.id.is_empty());
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let mut site = Website::new("https://example.com", "Example");
        site.url.clear();
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_sort_fields() {
        assert!(Website::is_valid_sort_field("created_at"));
        assert!(!Website::is_valid_sort_field("description"));
    }
}
