//! Top-K retrieval over the knowledge index.
//!
//! Embeds the query through the injected service and ranks stored chunks
//! by cosine similarity via whichever backend the index carries. The
//! contract is backend-agnostic: at most `k` hits, descending score, ties
//! in insertion order.

use serde::Serialize;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::RetrievalError;
use crate::index::KnowledgeIndex;
use crate::store::ScoredChunk;

/// Ranked retrieval output plus the diagnostics consumers display: which
/// backend answered and against which index generation.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub backend: String,
    pub generation: Uuid,
    pub hits: Vec<ScoredChunk>,
}

/// Retrieve the top `k` chunks for `query`.
///
/// Embedding and search failures propagate to the caller; they are never
/// swallowed into an empty result.
pub async fn retrieve(
    index: &KnowledgeIndex,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Retrieval, RetrievalError> {
    let query_vec = embedder.embed_query(query).await?;
    let hits = index.store.vector_search(&query_vec, k).await?;

    Ok(Retrieval {
        backend: index.backend.clone(),
        generation: index.generation,
        hits,
    })
}
