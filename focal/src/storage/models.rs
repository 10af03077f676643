//! Request and response shapes shared by every collection store

use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};

/// Sort direction for [`ListOptions::order_by`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Options for [`CollectionStore::get_all`](super::collection::CollectionStore::get_all)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ListOptions {
    /// Page size; `None` returns everything from `offset` on
    pub limit: Option<usize>,

    /// Number of records to skip
    pub offset: Option<usize>,

    /// Field to order by; must be allow-listed by the record type
    pub order_by: Option<String>,

    /// Direction applied to `order_by`
    pub order_direction: SortDirection,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(field.into());
        self.order_direction = direction;
        self
    }

    /// A page size of zero could never make progress
    pub fn validate(&self) -> StoreResult<()> {
        if self.limit == Some(0) {
            return Err(StoreError::validation("limit must be greater than 0"));
        }
        Ok(())
    }
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    /// Records on this page
    pub data: Vec<T>,

    /// Size of the whole collection
    pub total: usize,

    /// Whether records remain after this page
    pub has_more: bool,

    /// Offset of the next page, present iff `has_more`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

impl<T> Page<T> {
    /// Cut a page out of an already ordered listing
    pub fn paginate(items: Vec<T>, offset: usize, limit: Option<usize>) -> Self {
        let total = items.len();
        let (has_more, next_offset) = match limit {
            Some(limit) => {
                let end = offset.saturating_add(limit);
                if end < total {
                    (true, Some(end))
                } else {
                    (false, None)
                }
            }
            None => (false, None),
        };

        let data = items
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        Self {
            data,
            total,
            has_more,
            next_offset,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            has_more: false,
            next_offset: None,
        }
    }
}

/// Result of a bulk write in which every item committed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    /// Ids written or deleted, in request order
    pub committed: Vec<String>,
}

impl BulkOutcome {
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

/// A single item that failed inside a bulk write
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_options_fill_missing_fields() {
        let options: ListOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ListOptions::default());

        let options: ListOptions =
            serde_json::from_str(r#"{"limit": 5, "order_by": "title"}"#).unwrap();
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.order_direction, SortDirection::Asc);
    }

    #[test]
    fn test_paginate_first_page() {
        let page = Page::paginate((0..10).collect(), 0, Some(3));
        assert_eq!(page.data, vec![0, 1, 2]);
        assert_eq!(page.total, 10);
        assert!(page.has_more);
        assert_eq!(page.next_offset, Some(3));
    }

    #[test]
    fn test_paginate_last_page_exact() {
        let page = Page::paginate((0..10).collect(), 7, Some(3));
        assert_eq!(page.data, vec![7, 8, 9]);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn test_paginate_without_limit_returns_everything() {
        let page = Page::paginate((0..5).collect(), 0, None);
        assert_eq!(page.data.len(), 5);
        assert!(!page.has_more);
    }

    #[test]
    fn test_paginate_offset_past_end() {
        let page: Page<i32> = Page::paginate((0..5).collect(), 10, Some(2));
        assert!(page.data.is_empty());
        assert_eq!(page.total, 5);
        assert!(!page.has_more);
    }

    #[test]
    fn test_pagination_invariant_holds_for_all_windows() {
        let total = 7;
        for limit in 1..=8 {
            for offset in 0..=9 {
                let page = Page::paginate((0..total).collect::<Vec<_>>(), offset, Some(limit));
                assert_eq!(page.has_more, offset + limit < total);
                assert_eq!(page.next_offset.is_some(), page.has_more);
            }
        }
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(ListOptions::new().limit(0).validate().is_err());
        assert!(ListOptions::new().limit(1).validate().is_ok());
    }
}
