//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `DocumentStore` / `SqlitePassageStore`: the persistent passage index
//! - `Embedder`: text-to-vector functions used by the store
//! - `Retriever`: jurisdiction-filtered retrieval
//! - `ContextAssembler`: bounded context text with source attribution

pub mod context_builder;
pub mod embedding;
pub mod retriever;
pub mod seed;
pub mod sqlite;
pub mod store;

pub use context_builder::{
    AssembledContext, ContextAssembler, ContextBuilderConfig, NO_DOCUMENTS_SENTINEL,
};
pub use embedding::{build_embedder, Embedder, HashingEmbedder, OpenAiEmbedder};
pub use retriever::Retriever;
pub use seed::{starter_corpus, SeedRecord};
pub use sqlite::SqlitePassageStore;
pub use store::{DocumentStore, JurisdictionFilter, Passage, ScoredPassage};
