//! DocumentStore trait: abstract interface over the passage index.
//!
//! The primary implementation is `SqlitePassageStore` in the `sqlite` module.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ResearchError;

/// Jurisdiction tag that matches every requested jurisdiction.
pub const UNIVERSAL_JURISDICTION: &str = "all";

/// One retrievable unit of legal text with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub jurisdiction: String,
    pub title: String,
    pub source: String,
}

impl Passage {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        jurisdiction: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            jurisdiction: jurisdiction.into(),
            title: title.into(),
            source: source.into(),
        }
    }
}

/// A passage paired with its similarity to the query (higher = better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Normalised form of a jurisdiction tag.
pub fn normalize_jurisdiction(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Set of jurisdiction tags a query accepts. Matching is exact, never substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JurisdictionFilter {
    accepted: HashSet<String>,
}

impl JurisdictionFilter {
    pub fn exact(tag: &str) -> Self {
        Self::any_of([tag])
    }

    pub fn any_of<'a, I>(tags: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            accepted: tags.into_iter().map(normalize_jurisdiction).collect(),
        }
    }

    pub fn matches(&self, jurisdiction: &str) -> bool {
        self.accepted.contains(jurisdiction)
    }
}

/// Rejects the batch at the first passage with a blank id or text.
pub fn validate_batch(passages: &[Passage]) -> Result<(), ResearchError> {
    for (index, passage) in passages.iter().enumerate() {
        if passage.id.trim().is_empty() {
            return Err(ResearchError::InvalidArgument(format!(
                "passage at batch index {} has an empty id",
                index
            )));
        }
        if passage.text.trim().is_empty() {
            return Err(ResearchError::InvalidArgument(format!(
                "passage '{}' has empty text",
                passage.id
            )));
        }
    }
    Ok(())
}

/// Abstract trait for passage storage backends.
///
/// Implementations must:
/// - compute embeddings themselves, deterministically from `text`
/// - apply a batch insert all-or-nothing
/// - let concurrent queries proceed while never exposing a half-written passage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upsert a batch of passages keyed by id.
    async fn insert(&self, passages: Vec<Passage>) -> Result<(), ResearchError>;

    /// Nearest-neighbour query, best `top_k` first, ties by insertion order.
    async fn query(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&JurisdictionFilter>,
    ) -> Result<Vec<ScoredPassage>, ResearchError>;

    async fn get(&self, id: &str) -> Result<Option<Passage>, ResearchError>;

    async fn delete(&self, id: &str) -> Result<bool, ResearchError>;

    async fn count(&self) -> Result<usize, ResearchError>;

    /// Recompute every embedding with the current embedder.
    ///
    /// Used when the embedding model changes and all vectors are invalidated.
    async fn reindex(&self) -> Result<(), ResearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_exact_tags_only() {
        let filter = JurisdictionFilter::any_of(["Nigeria", UNIVERSAL_JURISDICTION]);

        assert!(filter.matches("nigeria"));
        assert!(filter.matches("all"));
        assert!(!filter.matches("nigeria-lagos"));
        assert!(!filter.matches("niger"));
        assert!(!filter.matches("france"));
    }

    #[test]
    fn validate_batch_names_the_failing_passage() {
        let ok = Passage::new("doc1", "Some text", "all", "T", "S");
        let blank_text = Passage::new("doc2", "   ", "all", "T", "S");
        let blank_id = Passage::new("", "text", "all", "T", "S");

        validate_batch(&[ok.clone()]).unwrap();

        let err = validate_batch(&[ok.clone(), blank_text]).unwrap_err();
        assert!(matches!(err, ResearchError::InvalidArgument(ref m) if m.contains("'doc2'")));

        let err = validate_batch(&[ok, blank_id]).unwrap_err();
        assert!(matches!(err, ResearchError::InvalidArgument(ref m) if m.contains("index 1")));
    }
}
