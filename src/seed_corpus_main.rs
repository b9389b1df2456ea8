//! Seeds the passage store from a JSON array of records, or with the
//! built-in starter corpus when no file is given.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use legal_research::core::config::AppPaths;
use legal_research::core::logging;
use legal_research::rag::{starter_corpus, DocumentStore, Passage, SeedRecord};
use legal_research::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let passages = match std::env::args().nth(1) {
        Some(file) => load_records(PathBuf::from(file))?,
        None => starter_corpus(),
    };

    let state = AppState::initialize(paths).await?;
    let batch_size = passages.len();
    state
        .store
        .insert(passages)
        .await
        .context("Failed to seed passage store")?;
    let total = state.store.count().await?;

    tracing::info!(
        inserted = batch_size,
        total,
        path = %state.store.path().display(),
        "Corpus seeded"
    );
    println!("Seeded {} passages ({} total)", batch_size, total);

    state.shutdown().await;
    Ok(())
}

fn load_records(path: PathBuf) -> anyhow::Result<Vec<Passage>> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<SeedRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed records in {}", path.display()))?;
    Ok(records.into_iter().map(Passage::from).collect())
}
