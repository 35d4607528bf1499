//! In-memory [`ChunkStore`]: the portable fallback backend.
//!
//! Brute-force cosine similarity over a `Vec` behind `std::sync::RwLock`.
//! Nothing persists across restarts, and initialization cannot fail.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::chunk::Chunk;
use crate::embedding::cosine_similarity;

use super::{rank_candidates, ChunkStore, ScoredChunk};

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk/vector count mismatch: {} vs {}",
            chunks.len(),
            vectors.len()
        );
        let mut rows = self.rows.write().expect("memory store lock poisoned");
        *rows = chunks
            .iter()
            .cloned()
            .zip(vectors.iter().cloned())
            .collect();
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = self.rows.read().expect("memory store lock poisoned");
        let candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|(chunk, vec)| ScoredChunk {
                id: chunk.id.clone(),
                source: chunk.source.clone(),
                text: chunk.text.clone(),
                score: cosine_similarity(query_vec, vec),
            })
            .collect();
        Ok(rank_candidates(candidates, k))
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.rows.read().expect("memory store lock poisoned").len())
    }
}
