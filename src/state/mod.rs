use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, ResearchSettings};
use crate::llm::{LlmProvider, OpenAiCompatibleProvider};
use crate::rag::{
    build_embedder, ContextAssembler, ContextBuilderConfig, DocumentStore, Retriever,
    SqlitePassageStore,
};
use crate::research::{AnswerGenerator, ResearchService};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Owns the one passage store instance; everything that reads or writes
/// passages goes through it.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: ResearchSettings,
    pub store: SqlitePassageStore,
    pub llm: Arc<dyn LlmProvider>,
    pub research: ResearchService,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Loads configuration relative to `paths`
    /// 2. Opens the passage store with the configured embedder
    /// 3. Wires retriever, context assembler and answer generator
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config.load_settings().map_err(InitializationError::Config)?;

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
            settings.llm.base_url.clone(),
            settings.llm.api_key.clone(),
        ));

        Self::assemble(config, settings, llm).await
    }

    /// Builds the state from already-loaded settings and an explicit provider.
    pub async fn assemble(
        config: ConfigService,
        settings: ResearchSettings,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let paths = config.paths().clone();
        let embedder = build_embedder(&settings.store.embedding, &settings.llm);
        let store = SqlitePassageStore::open(config.index_path(&settings), embedder)
            .await
            .map_err(InitializationError::Store)?;

        let shared_store: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let research = ResearchService::new(
            Retriever::new(shared_store),
            ContextAssembler::new(ContextBuilderConfig {
                max_context_chars: settings.context.max_chars,
            }),
            AnswerGenerator::new(llm.clone(), settings.llm.clone()),
            settings.retrieval.clone(),
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            store,
            llm,
            research,
        }))
    }

    /// Flushes and closes the store. Call once after the server stops.
    pub async fn shutdown(&self) {
        self.store.close().await;
        tracing::info!("Application state shut down");
    }
}
