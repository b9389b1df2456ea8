//! SQLite-backed passage store.
//!
//! SQLite is the durable copy; an in-memory index mirrors it for scoring.
//! Queries score by brute-force cosine similarity under a shared read guard.
//! Writers are serialised, commit to SQLite first and only then swap the
//! in-memory entries, so readers see either the old or the new
//! passage/embedding pair and never a mix.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use super::embedding::{embed_checked, Embedder};
use super::store::{
    normalize_jurisdiction, validate_batch, DocumentStore, JurisdictionFilter, Passage,
    ScoredPassage,
};
use crate::core::errors::ResearchError;
use crate::vector_math::rank_descending_by_cosine;

const META_EMBEDDING_MODEL: &str = "embedding_model";

#[derive(Debug, Clone)]
struct IndexedPassage {
    passage: Passage,
    embedding: Vec<f32>,
    seq: i64,
}

/// Entries kept in ascending `seq` (insertion) order.
#[derive(Debug, Default)]
struct PassageIndex {
    entries: Vec<IndexedPassage>,
    positions: HashMap<String, usize>,
}

impl PassageIndex {
    fn seq_of(&self, id: &str) -> Option<i64> {
        self.positions.get(id).map(|&pos| self.entries[pos].seq)
    }

    fn get(&self, id: &str) -> Option<&IndexedPassage> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    /// Replaces in place for a known id, appends otherwise.
    fn upsert(&mut self, entry: IndexedPassage) {
        match self.positions.get(&entry.passage.id) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.positions
                    .insert(entry.passage.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.positions.remove(id) else {
            return false;
        };
        self.entries.remove(pos);
        for entry in &self.entries[pos..] {
            if let Some(slot) = self.positions.get_mut(&entry.passage.id) {
                *slot -= 1;
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct WriterState {
    next_seq: i64,
}

struct StoreInner {
    pool: SqlitePool,
    db_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    index: RwLock<PassageIndex>,
    writer: Mutex<WriterState>,
}

/// Persistent passage store. Cheap to clone; clones share one index.
#[derive(Clone)]
pub struct SqlitePassageStore {
    inner: Arc<StoreInner>,
}

impl SqlitePassageStore {
    /// Opens (or creates) the index at `db_path` and loads it into memory.
    ///
    /// When the embedder's model id differs from the one recorded in the
    /// database, every passage is re-embedded before the store is returned.
    pub async fn open(db_path: PathBuf, embedder: Arc<dyn Embedder>) -> Result<Self, ResearchError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ResearchError::store)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ResearchError::store)?;

        init_schema(&pool).await?;
        let (index, next_seq) = load_index(&pool).await?;

        let store = Self {
            inner: Arc::new(StoreInner {
                pool,
                db_path,
                embedder,
                index: RwLock::new(index),
                writer: Mutex::new(WriterState { next_seq }),
            }),
        };

        store.ensure_embedding_model().await?;

        let passages = store.read_index()?.len();
        tracing::info!(
            path = %store.inner.db_path.display(),
            passages,
            embedder = store.inner.embedder.model_id(),
            "Passage store opened"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.inner.db_path
    }

    /// Drains the connection pool. Further writes fail; reads of the
    /// in-memory index keep working until the last clone is dropped.
    pub async fn close(&self) {
        self.inner.pool.close().await;
        tracing::info!(path = %self.inner.db_path.display(), "Passage store closed");
    }

    async fn ensure_embedding_model(&self) -> Result<(), ResearchError> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?1")
                .bind(META_EMBEDDING_MODEL)
                .fetch_optional(&self.inner.pool)
                .await
                .map_err(ResearchError::store)?;

        let current = self.inner.embedder.model_id().to_string();
        let dimension = self.inner.embedder.dimension();
        let stale = {
            let index = self.read_index()?;
            let model_changed = index.len() > 0 && stored.as_deref() != Some(current.as_str());
            let shape_changed = index
                .entries
                .iter()
                .any(|entry| entry.embedding.len() != dimension);
            model_changed || shape_changed
        };

        if stale {
            tracing::warn!(
                previous = stored.as_deref().unwrap_or("<none>"),
                current = %current,
                "Embedding model changed; re-embedding corpus"
            );
            self.reindex().await
        } else {
            record_embedding_model(&self.inner.pool, &current).await
        }
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, PassageIndex>, ResearchError> {
        self.inner.read_index()
    }
}

impl StoreInner {
    fn read_index(&self) -> Result<RwLockReadGuard<'_, PassageIndex>, ResearchError> {
        self.index
            .read()
            .map_err(|_| ResearchError::Store("passage index lock poisoned".to_string()))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, PassageIndex>, ResearchError> {
        self.index
            .write()
            .map_err(|_| ResearchError::Store("passage index lock poisoned".to_string()))
    }

    /// Persists a validated, embedded batch in one transaction, then swaps it into the index.
    async fn commit_batch(&self, batch: Vec<(Passage, Vec<f32>)>) -> Result<(), ResearchError> {
        let mut writer = self.writer.lock().await;

        let mut next_seq = writer.next_seq;
        let entries: Vec<IndexedPassage> = {
            let index = self.read_index()?;
            batch
                .into_iter()
                .map(|(passage, embedding)| {
                    let seq = index.seq_of(&passage.id).unwrap_or_else(|| {
                        let seq = next_seq;
                        next_seq += 1;
                        seq
                    });
                    IndexedPassage {
                        passage,
                        embedding,
                        seq,
                    }
                })
                .collect()
        };

        let mut tx = self.pool.begin().await.map_err(ResearchError::store)?;
        for entry in &entries {
            let passage = &entry.passage;
            sqlx::query(
                "INSERT INTO passages (id, seq, text, jurisdiction, title, source, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    jurisdiction = excluded.jurisdiction,
                    title = excluded.title,
                    source = excluded.source,
                    embedding = excluded.embedding,
                    updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')",
            )
            .bind(&passage.id)
            .bind(entry.seq)
            .bind(&passage.text)
            .bind(&passage.jurisdiction)
            .bind(&passage.title)
            .bind(&passage.source)
            .bind(serialize_embedding(&entry.embedding))
            .execute(&mut *tx)
            .await
            .map_err(ResearchError::store)?;
        }
        tx.commit().await.map_err(ResearchError::store)?;

        let mut index = self.write_index()?;
        for entry in entries {
            index.upsert(entry);
        }
        writer.next_seq = next_seq;
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> Result<bool, ResearchError> {
        let _writer = self.writer.lock().await;

        let result = sqlx::query("DELETE FROM passages WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ResearchError::store)?;

        let removed = self.write_index()?.remove(id);
        Ok(removed || result.rows_affected() > 0)
    }

    async fn reembed_all(&self) -> Result<(), ResearchError> {
        let _writer = self.writer.lock().await;

        let snapshot: Vec<IndexedPassage> = self.read_index()?.entries.clone();
        let texts: Vec<String> = snapshot.iter().map(|e| e.passage.text.clone()).collect();
        let vectors = embed_checked(self.embedder.as_ref(), &texts).await?;

        let mut tx = self.pool.begin().await.map_err(ResearchError::store)?;
        for (entry, vector) in snapshot.iter().zip(vectors.iter()) {
            sqlx::query("UPDATE passages SET embedding = ?1 WHERE id = ?2")
                .bind(serialize_embedding(vector))
                .bind(&entry.passage.id)
                .execute(&mut *tx)
                .await
                .map_err(ResearchError::store)?;
        }
        sqlx::query(
            "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
             VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(META_EMBEDDING_MODEL)
        .bind(self.embedder.model_id())
        .execute(&mut *tx)
        .await
        .map_err(ResearchError::store)?;
        tx.commit().await.map_err(ResearchError::store)?;

        let mut index = self.write_index()?;
        for (entry, vector) in snapshot.into_iter().zip(vectors) {
            index.upsert(IndexedPassage {
                embedding: vector,
                ..entry
            });
        }
        tracing::info!(passages = index.len(), "Corpus re-embedded");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqlitePassageStore {
    async fn insert(&self, passages: Vec<Passage>) -> Result<(), ResearchError> {
        if passages.is_empty() {
            return Ok(());
        }
        validate_batch(&passages)?;

        // Later duplicates in one batch replace earlier ones.
        let mut batch: Vec<Passage> = Vec::with_capacity(passages.len());
        let mut slots: HashMap<String, usize> = HashMap::new();
        for mut passage in passages {
            passage.id = passage.id.trim().to_string();
            passage.jurisdiction = normalize_jurisdiction(&passage.jurisdiction);
            match slots.get(&passage.id) {
                Some(&slot) => batch[slot] = passage,
                None => {
                    slots.insert(passage.id.clone(), batch.len());
                    batch.push(passage);
                }
            }
        }

        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let vectors = embed_checked(self.inner.embedder.as_ref(), &texts).await?;
        let count = batch.len();

        // Detached so a cancelled caller cannot stop the commit half-way.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.commit_batch(batch.into_iter().zip(vectors).collect()).await })
            .await
            .map_err(ResearchError::store)??;

        tracing::debug!(count, "Inserted passage batch");
        Ok(())
    }

    async fn query(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&JurisdictionFilter>,
    ) -> Result<Vec<ScoredPassage>, ResearchError> {
        if top_k == 0 {
            return Err(ResearchError::invalid("top_k must be a positive integer"));
        }
        if self.read_index()?.len() == 0 {
            return Ok(Vec::new());
        }

        let query_vector = embed_checked(self.inner.embedder.as_ref(), &[query_text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| ResearchError::Store("embedder returned no query vector".to_string()))?;

        let index = self.read_index()?;
        let candidates: Vec<&IndexedPassage> = index
            .entries
            .iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.passage.jurisdiction)))
            .collect();

        let ranked = rank_descending_by_cosine(
            &query_vector,
            candidates.iter().map(|entry| entry.embedding.as_slice()),
        );

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(idx, score)| ScoredPassage {
                passage: candidates[idx].passage.clone(),
                score,
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Passage>, ResearchError> {
        Ok(self.read_index()?.get(id).map(|entry| entry.passage.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, ResearchError> {
        let inner = Arc::clone(&self.inner);
        let id = id.to_string();
        tokio::spawn(async move { inner.delete_one(&id).await })
            .await
            .map_err(ResearchError::store)?
    }

    async fn count(&self) -> Result<usize, ResearchError> {
        Ok(self.read_index()?.len())
    }

    async fn reindex(&self) -> Result<(), ResearchError> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.reembed_all().await })
            .await
            .map_err(ResearchError::store)?
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), ResearchError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS passages (
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            jurisdiction TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT '',
            embedding BLOB NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(ResearchError::store)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_passages_seq ON passages(seq)")
        .execute(pool)
        .await
        .map_err(ResearchError::store)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(ResearchError::store)?;

    Ok(())
}

async fn load_index(pool: &SqlitePool) -> Result<(PassageIndex, i64), ResearchError> {
    let rows = sqlx::query(
        "SELECT id, seq, text, jurisdiction, title, source, embedding
         FROM passages
         ORDER BY seq ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(ResearchError::store)?;

    let mut index = PassageIndex::default();
    let mut next_seq = 0;
    for row in &rows {
        let seq: i64 = row.get("seq");
        let embedding_bytes: Vec<u8> = row.get("embedding");
        next_seq = next_seq.max(seq + 1);
        index.upsert(IndexedPassage {
            passage: Passage {
                id: row.get("id"),
                text: row.get("text"),
                jurisdiction: row.get("jurisdiction"),
                title: row.get("title"),
                source: row.get("source"),
            },
            embedding: deserialize_embedding(&embedding_bytes),
            seq,
        });
    }
    Ok((index, next_seq))
}

async fn record_embedding_model(pool: &SqlitePool, model: &str) -> Result<(), ResearchError> {
    sqlx::query(
        "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
         VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
    )
    .bind(META_EMBEDDING_MODEL)
    .bind(model)
    .execute(pool)
    .await
    .map_err(ResearchError::store)?;
    Ok(())
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
