//! Term extraction for the relevance engine.
//!
//! Text is lowercased, stripped of a fixed punctuation class, split on
//! whitespace, and filtered against a stop-word list and a minimum length.
//! Multi-word proper nouns are glued into one token with
//! [`PROPER_NOUN_MARKER`] so that a common first name does not count as an
//! occurrence of every person carrying it.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Joins the words of a proper noun. Private-use code point outside the
/// punctuation class.
pub const PROPER_NOUN_MARKER: char = '\u{E000}';

/// Terms starting with this prefix are bookkeeping and never listed
pub const RESERVED_PREFIX: &str = "__";

lazy_static! {
    // no `_`: reserved terms must survive tokenization
    static ref PUNCTUATION: Regex = Regex::new(
        r#"[.,/#!?$%^&*;:{}=\-`~()\[\]<>|\\+"'@“”‘’«»…–—]"#
    ).unwrap();

    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no",
        "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
        "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so", "some",
        "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
        "there", "these", "they", "this", "those", "through", "to", "too", "under",
        "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
        "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
        "yourself", "yourselves", "http", "https", "www", "com",
    ]
    .into_iter()
    .collect();
}

/// Lowercase `word` and remove punctuation
pub fn normalize_token(word: &str) -> String {
    PUNCTUATION.replace_all(&word.to_lowercase(), "").into_owned()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// Split `text` into countable terms, duplicates kept in order
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped
        .split_whitespace()
        .filter(|token| token.chars().count() > 1 && !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// Glue the words of a proper noun into one term: `"Ada Lovelace"` becomes
/// a single token that [`render_term`] turns back into `"ada lovelace"`.
pub fn mark_proper_noun(name: &str) -> String {
    let marker = PROPER_NOUN_MARKER.to_string();
    name.split_whitespace()
        .map(normalize_token)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(&marker)
}

/// Human-readable form of a term
pub fn render_term(term: &str) -> String {
    term.replace(PROPER_NOUN_MARKER, " ")
}

pub fn is_reserved(term: &str) -> bool {
    term.starts_with(RESERVED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation_and_stop_words() {
        let tokens = tokenize("The quick, brown fox -- jumps over a lazy dog!");
        assert_eq!(tokens, vec!["quick", "brown", "fox", "jumps", "lazy", "dog"]);
    }

    #[test]
    fn test_tokenize_drops_single_characters() {
        assert_eq!(tokenize("x y zz"), vec!["zz"]);
    }

    #[test]
    fn test_tokenize_keeps_duplicates() {
        assert_eq!(tokenize("alpha beta beta"), vec!["alpha", "beta", "beta"]);
    }

    #[test]
    fn test_proper_noun_survives_tokenization() {
        let marked = mark_proper_noun("Ada Lovelace");
        let tokens = tokenize(&format!("met {} today", marked));
        assert_eq!(tokens.len(), 3);
        assert_eq!(render_term(&tokens[1]), "ada lovelace");
        assert!(!tokens.contains(&"ada".to_string()));
    }

    #[test]
    fn test_reserved_terms() {
        assert!(is_reserved("__key"));
        assert!(!is_reserved("key"));
        assert_eq!(tokenize("__key"), vec!["__key"]);
    }
}
