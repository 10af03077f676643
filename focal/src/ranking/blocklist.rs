//! Domain and site blocklists

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{BlockKind, BlockRule, normalize_url};
use crate::storage::collection::CollectionStore;
use crate::storage::errors::StoreResult;
use crate::storage::models::ListOptions;

/// Set of blocked domains and URL prefixes.
///
/// A domain rule blocks the domain itself and every subdomain; a site rule
/// blocks every URL whose normalized form starts with the normalized rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blocklist {
    domains: Vec<String>,
    sites: Vec<String>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules<'a, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = &'a BlockRule>,
    {
        let mut blocklist = Self::new();
        for rule in rules {
            match rule.kind {
                BlockKind::Domain => blocklist.block_domain(&rule.pattern),
                BlockKind::Site => blocklist.block_site(&rule.pattern),
            }
        }
        blocklist
    }

    pub fn block_domain(&mut self, domain: &str) {
        let domain = normalize_domain(domain);
        if !domain.is_empty() && !self.domains.contains(&domain) {
            self.domains.push(domain);
        }
    }

    pub fn block_site(&mut self, site: &str) {
        let site = normalize_url(site);
        if !site.is_empty() && !self.sites.contains(&site) {
            self.sites.push(site);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.domains.len() + self.sites.len()
    }

    pub fn blocks_domain(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        self.domains.iter().any(|rule| {
            domain == *rule
                || (domain.len() > rule.len()
                    && domain.ends_with(rule.as_str())
                    && domain.as_bytes()[domain.len() - rule.len() - 1] == b'.')
        })
    }

    pub fn blocks_url(&self, url: &str) -> bool {
        let url = normalize_url(url);
        self.sites.iter().any(|rule| url.starts_with(rule.as_str()))
    }

    /// Whether a page at `url` on `domain` is blocked by any rule
    pub fn is_blocked(&self, url: &str, domain: &str) -> bool {
        self.blocks_domain(domain) || self.blocks_url(url)
    }
}

fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_start_matches('.').to_lowercase();
    match domain.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => domain,
    }
}

/// Supplier of the current blocklist
#[async_trait]
pub trait BlocklistProvider: Send + Sync {
    async fn blocklist(&self) -> StoreResult<Blocklist>;
}

#[async_trait]
impl BlocklistProvider for Blocklist {
    async fn blocklist(&self) -> StoreResult<Blocklist> {
        Ok(self.clone())
    }
}

/// Rules persisted in the `blocklist` collection
#[async_trait]
impl BlocklistProvider for CollectionStore<BlockRule> {
    async fn blocklist(&self) -> StoreResult<Blocklist> {
        let page = self.get_all(ListOptions::default()).await?;
        Ok(Blocklist::from_rules(&page.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_rule_matches_subdomains_only_on_label_boundary() {
        let mut blocklist = Blocklist::new();
        blocklist.block_domain("Example.com");

        assert!(blocklist.blocks_domain("example.com"));
        assert!(blocklist.blocks_domain("mail.example.com"));
        assert!(blocklist.blocks_domain("www.example.com"));
        assert!(!blocklist.blocks_domain("badexample.com"));
        assert!(!blocklist.blocks_domain("example.org"));
    }

    #[test]
    fn test_site_rule_is_a_normalized_prefix() {
        let mut blocklist = Blocklist::new();
        blocklist.block_site("https://www.reddit.com/r/rust/");

        assert!(blocklist.blocks_url("http://reddit.com/r/rust"));
        assert!(blocklist.blocks_url("https://reddit.com/r/rust/comments/1"));
        assert!(!blocklist.blocks_url("https://reddit.com/r/python"));
        assert!(!blocklist.is_blocked("https://reddit.com/", "reddit.com"));
    }

    #[test]
    fn test_from_rules() {
        let rules = vec![BlockRule::domain("news.com"), BlockRule::site("docs.rs/foo")];
        let blocklist = Blocklist::from_rules(&rules);
        assert_eq!(blocklist.len(), 2);
        assert!(blocklist.is_blocked("https://news.com/today", "news.com"));
        assert!(blocklist.is_blocked("https://docs.rs/foo/latest", "docs.rs"));
        assert!(!blocklist.is_blocked("https://docs.rs/bar", "docs.rs"));
    }

    #[test]
    fn test_duplicates_and_blanks_are_ignored() {
        let mut blocklist = Blocklist::new();
        blocklist.block_domain("a.com");
        blocklist.block_domain("A.com ");
        blocklist.block_site("  ");
        assert_eq!(blocklist.len(), 1);
    }
}
