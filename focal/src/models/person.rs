//! Contacts

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::traits::{IndexEntry, Record, SortValue};

/// A person the user interacts with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,

    /// Known email addresses; each one is indexed
    #[serde(default)]
    pub emails: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            emails: Vec::new(),
            notes: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.emails.push(email.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Record for Person {
    const COLLECTION: &'static str = "person";
    const SORT_FIELDS: &'static [&'static str] = &["id", "name"];

    fn id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut emails: Vec<String> = self
            .emails
            .iter()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        emails.sort();
        emails.dedup();
        emails
            .into_iter()
            .map(|email| IndexEntry::new("email", email))
            .collect()
    }

    fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::validation("person record has an empty id"));
        }
        if self.name.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "person '{}' has an empty name",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_index_is_normalized_and_deduplicated() {
        let person = Person::new("Ada Lovelace")
            .with_email("Ada@Example.com")
            .with_email("ada@example.com ")
            .with_email("countess@example.com");

        let entries = person.index_entries();
        assert_eq!(
            entries,
            vec![
                IndexEntry::new("email", "ada@example.com"),
                IndexEntry::new("email", "countess@example.com"),
            ]
        );
    }
}
