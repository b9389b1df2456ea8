//! Jurisdiction-aware retrieval on top of a `DocumentStore`.
//!
//! Filter policy lives here so the storage engine stays policy-free.

use std::sync::Arc;

use super::store::{DocumentStore, JurisdictionFilter, ScoredPassage, UNIVERSAL_JURISDICTION};
use crate::core::errors::ResearchError;

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Ranked passages for `query`. A requested jurisdiction matches passages
    /// tagged with it exactly, plus passages tagged `"all"`.
    pub async fn fetch(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, ResearchError> {
        let filter = jurisdiction_filter(jurisdiction);
        let results = self.store.query(query, top_k, filter.as_ref()).await?;

        tracing::debug!(
            jurisdiction = jurisdiction.unwrap_or("<any>"),
            top_k,
            hits = results.len(),
            "Retrieved passages"
        );
        Ok(results)
    }
}

/// `None` (or a blank tag) means unfiltered.
pub fn jurisdiction_filter(jurisdiction: Option<&str>) -> Option<JurisdictionFilter> {
    jurisdiction
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| JurisdictionFilter::any_of([tag, UNIVERSAL_JURISDICTION]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embedding::HashingEmbedder;
    use crate::rag::seed::starter_corpus;
    use crate::rag::sqlite::SqlitePassageStore;

    async fn seeded_retriever(dir: &tempfile::TempDir) -> Retriever {
        let store = SqlitePassageStore::open(
            dir.path().join("index.db"),
            Arc::new(HashingEmbedder::new(512)),
        )
        .await
        .unwrap();
        store.insert(starter_corpus()).await.unwrap();
        Retriever::new(Arc::new(store))
    }

    fn ids(results: &[ScoredPassage]) -> Vec<&str> {
        results.iter().map(|r| r.passage.id.as_str()).collect()
    }

    #[test]
    fn blank_jurisdiction_means_no_filter() {
        assert!(jurisdiction_filter(None).is_none());
        assert!(jurisdiction_filter(Some("  ")).is_none());

        let filter = jurisdiction_filter(Some("Nigeria")).unwrap();
        assert!(filter.matches("nigeria"));
        assert!(filter.matches("all"));
        assert!(!filter.matches("ghana"));
    }

    #[tokio::test]
    async fn nigeria_query_ranks_labor_act_first() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = seeded_retriever(&dir).await;

        let results = retriever
            .fetch("employment contract obligations", Some("nigeria"), 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].passage.id, "doc3");
        assert!(results
            .iter()
            .all(|r| r.passage.jurisdiction == "nigeria" || r.passage.jurisdiction == "all"));
    }

    #[tokio::test]
    async fn foreign_jurisdiction_only_sees_universal_passages() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = seeded_retriever(&dir).await;

        let results = retriever
            .fetch("employment contract obligations", Some("france"), 5)
            .await
            .unwrap();

        let mut found = ids(&results);
        found.sort();
        assert_eq!(found, vec!["doc2", "doc5"]);
    }

    #[tokio::test]
    async fn universal_passages_are_returned_for_every_filter() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = seeded_retriever(&dir).await;

        for jurisdiction in [None, Some("nigeria"), Some("ghana"), Some("all")] {
            let results = retriever.fetch("law", jurisdiction, 5).await.unwrap();
            let found = ids(&results);
            assert!(found.contains(&"doc2"), "{:?}", jurisdiction);
            assert!(found.contains(&"doc5"), "{:?}", jurisdiction);
        }
    }

    #[tokio::test]
    async fn no_duplicate_ids_after_reinsert() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = seeded_retriever(&dir).await;
        retriever.store().insert(starter_corpus()).await.unwrap();

        let results = retriever.fetch("law", None, 10).await.unwrap();
        let mut found = ids(&results);
        found.sort();
        found.dedup();
        assert_eq!(found.len(), results.len());
        assert_eq!(results.len(), 5);
    }
}
