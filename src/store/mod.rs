//! Storage abstraction for the knowledge index.
//!
//! [`ChunkStore`] is the single capability seam between the index and its
//! similarity-search backend. Two interchangeable implementations exist:
//! a persistent SQLite store ([`sqlite::SqliteStore`], preferred) and a
//! brute-force in-memory store ([`memory::MemoryStore`], the portable
//! fallback). Callers never branch on which one is active — both satisfy
//! the same ranked-top-K contract.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::chunk::Chunk;

/// One retrieval hit: a stored chunk and its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Abstract chunk storage plus vector search.
///
/// `replace_all` swaps the full content in one atomic step so readers see
/// either the previous generation or the new one, never a mix.
/// `vector_search` returns at most `k` hits ordered by descending score,
/// ties broken by chunk insertion order.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Backend label for observability (`"sqlite"` or `"memory"`).
    fn name(&self) -> &'static str;

    /// Replace every stored chunk and vector with the given build output.
    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Rank stored chunks against the query vector.
    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Order candidates by descending score with a stable sort, preserving
/// insertion order between equal scores, and keep the top `k`.
pub(crate) fn rank_candidates(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);
    candidates
}
