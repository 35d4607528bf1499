//! SQLite-backed [`ChunkStore`]: the preferred, persistent backend.
//!
//! Chunks and their embedding vectors live in a single table; vectors are
//! little-endian f32 BLOBs. A populated database lets the service come up
//! without re-embedding the knowledge base. `replace_all` runs in one
//! transaction, so a rebuild lands atomically even for readers holding the
//! previous index generation against the same file.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::chunk::Chunk;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::BackendUnavailableError;

use super::{rank_candidates, ChunkStore, ScoredChunk};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and ensure the schema.
    ///
    /// Any failure here is a [`BackendUnavailableError`]: the caller is
    /// expected to fall back to the in-memory backend rather than fail
    /// the service.
    pub async fn open(path: &Path) -> Result<Self, BackendUnavailableError> {
        Self::open_inner(path).await.map_err(|e| BackendUnavailableError {
            backend: "sqlite",
            reason: e.to_string(),
        })
    }

    async fn open_inner(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                UNIQUE(source, chunk_index)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector count mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, source, chunk_index, text, hash, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        // Fetch in insertion order so the stable ranking sort keeps ties
        // deterministic.
        let rows = sqlx::query("SELECT id, source, text, embedding FROM chunks ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    id: row.get("id"),
                    source: row.get("source"),
                    text: row.get("text"),
                    score: cosine_similarity(query_vec, &vec),
                }
            })
            .collect();

        Ok(rank_candidates(candidates, k))
    }

    async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    async fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (dir, store)
    }

    fn fixture() -> (Vec<Chunk>, Vec<Vec<f32>>) {
        let chunks: Vec<Chunk> = ["배추 관수 요령", "사과 적과 시기", "포도 봉지 씌우기"]
            .iter()
            .enumerate()
            .flat_map(|(i, text)| chunk_text(&format!("doc{}.md", i), text, 500, 50))
            .collect();
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.7, 0.7, 0.0],
        ];
        (chunks, vectors)
    }

    #[tokio::test]
    async fn test_replace_roundtrip_and_order() {
        let (_dir, store) = open_temp().await;
        let (chunks, vectors) = fixture();
        store.replace_all(&chunks, &vectors).await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 3);

        let hits = store.vector_search(&[1.0, 0.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].id, "doc0.md#0");
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[tokio::test]
    async fn test_rebuild_discards_previous_generation() {
        let (_dir, store) = open_temp().await;
        let (chunks, vectors) = fixture();
        store.replace_all(&chunks, &vectors).await.unwrap();
        store
            .replace_all(&chunks[..1], &vectors[..1])
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("persist.sqlite");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            let (chunks, vectors) = fixture();
            store.replace_all(&chunks, &vectors).await.unwrap();
        }
        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(reopened.chunk_count().await.unwrap(), 3);
    }
}
