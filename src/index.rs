//! Knowledge index build and backend selection.
//!
//! A build scans the knowledge-base directory, chunks every document,
//! embeds the chunks, and hands the result to a [`ChunkStore`] in one
//! atomic replace. The output is an immutable [`KnowledgeIndex`] stamped
//! with a fresh generation token; re-indexing produces a whole new value
//! and the previous generation keeps serving until the swap.
//!
//! Backend selection mirrors the persistent-preferred rule: `sqlite` when
//! it initializes, the in-memory store when it cannot (`auto`), or exactly
//! what the configuration forces. A populated SQLite database is reused
//! without re-embedding (`sqlite-load`) unless a rebuild is forced.

use std::path::Path;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunk::{chunk_text, Chunk};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::IndexBuildError;
use crate::store::memory::MemoryStore;
use crate::store::sqlite::SqliteStore;
use crate::store::ChunkStore;

/// One complete, atomically-swapped build of the knowledge index.
pub struct KnowledgeIndex {
    pub store: Arc<dyn ChunkStore>,
    /// Active backend label: `sqlite-load`, `sqlite-build`, or
    /// `memory-build`.
    pub backend: String,
    /// Opaque version token, minted per build.
    pub generation: Uuid,
    pub chunk_count: usize,
    pub document_count: usize,
}

impl std::fmt::Debug for KnowledgeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeIndex")
            .field("backend", &self.backend)
            .field("generation", &self.generation)
            .field("chunk_count", &self.chunk_count)
            .field("document_count", &self.document_count)
            .finish()
    }
}

/// Build (or load) the knowledge index.
///
/// `force_rebuild` discards a reusable persistent store and re-embeds
/// everything. Fails with [`IndexBuildError`] when the KB directory is
/// missing or holds no usable documents.
pub async fn build_index(
    config: &Config,
    embedder: &dyn Embedder,
    force_rebuild: bool,
) -> Result<KnowledgeIndex, IndexBuildError> {
    let documents = scan_kb_dir(&config.kb.dir)?;
    let document_count = documents.len();

    let mut chunks: Vec<Chunk> = Vec::new();
    for (source, body) in &documents {
        chunks.extend(chunk_text(
            source,
            body,
            config.chunking.chunk_chars,
            config.chunking.overlap_chars,
        ));
    }
    if chunks.is_empty() {
        return Err(IndexBuildError::NoDocuments(config.kb.dir.clone()));
    }

    let store = select_store(config).await?;

    // Reuse a populated persistent store rather than re-embedding the
    // whole knowledge base on every start.
    if store.name() == "sqlite" && !force_rebuild {
        let existing = store.chunk_count().await?;
        if existing > 0 {
            let index = KnowledgeIndex {
                store,
                backend: "sqlite-load".to_string(),
                generation: Uuid::new_v4(),
                chunk_count: existing,
                document_count,
            };
            info!(
                backend = %index.backend,
                chunks = index.chunk_count,
                generation = %index.generation,
                "knowledge index loaded"
            );
            return Ok(index);
        }
    }

    let vectors = embed_chunks(embedder, &chunks, config.embedding.batch_size).await?;
    store.replace_all(&chunks, &vectors).await?;

    let index = KnowledgeIndex {
        backend: format!("{}-build", store.name()),
        store,
        generation: Uuid::new_v4(),
        chunk_count: chunks.len(),
        document_count,
    };
    info!(
        backend = %index.backend,
        documents = index.document_count,
        chunks = index.chunk_count,
        generation = %index.generation,
        "knowledge index built"
    );
    Ok(index)
}

/// Pick the similarity backend per configuration.
///
/// In `auto` mode a SQLite initialization failure is recovered locally:
/// logged, and the in-memory store takes over. A forced backend that
/// fails is a build error.
async fn select_store(config: &Config) -> Result<Arc<dyn ChunkStore>, IndexBuildError> {
    match config.index.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let store = SqliteStore::open(&config.index.db_path).await?;
            Ok(Arc::new(store))
        }
        _ => match SqliteStore::open(&config.index.db_path).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(err) => {
                warn!(error = %err, "preferred backend unavailable, using in-memory store");
                Ok(Arc::new(MemoryStore::new()))
            }
        },
    }
}

async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, IndexBuildError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        vectors.extend(embedder.embed(batch).await?);
    }
    if vectors.len() != chunks.len() {
        return Err(IndexBuildError::Embedding(
            crate::error::EmbeddingError::MalformedResponse(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )),
        ));
    }
    Ok(vectors)
}

/// Collect `*.txt` / `*.md` documents under the KB directory, sorted by
/// relative path for reproducible chunk ordering. Unreadable and empty
/// files are skipped.
fn scan_kb_dir(dir: &Path) -> Result<Vec<(String, String)>, IndexBuildError> {
    if !dir.is_dir() {
        return Err(IndexBuildError::MissingDirectory(dir.to_path_buf()));
    }

    let include = kb_globset();
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if !include.is_match(&rel_str) {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(body) if !body.trim().is_empty() => documents.push((rel_str, body)),
            _ => {}
        }
    }

    if documents.is_empty() {
        return Err(IndexBuildError::NoDocuments(dir.to_path_buf()));
    }

    documents.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(documents)
}

fn kb_globset() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["**/*.txt", "**/*.md"] {
        builder.add(Glob::new(pattern).expect("static glob"));
    }
    builder.build().expect("static globset")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ChunkingConfig, EmbeddingConfig, IndexConfig, KbConfig, RetrievalConfig, ServerConfig,
    };
    use crate::error::EmbeddingError;
    use async_trait::async_trait;

    /// Deterministic embedder: a tiny character-histogram vector.
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 8];
                    for (i, ch) in t.chars().enumerate() {
                        v[(ch as usize + i) % 8] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    fn config_for(dir: &Path, backend: &str, db_path: &Path) -> Config {
        Config {
            kb: KbConfig {
                dir: dir.to_path_buf(),
                keywords_path: dir.join("keywords.txt"),
                text_dir: dir.to_path_buf(),
            },
            chunking: ChunkingConfig {
                chunk_chars: 500,
                overlap_chars: 50,
            },
            retrieval: RetrievalConfig { top_k: 4 },
            embedding: EmbeddingConfig::default(),
            index: IndexConfig {
                backend: backend.to_string(),
                db_path: db_path.to_path_buf(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
        }
    }

    fn write_kb(dir: &Path) {
        std::fs::write(dir.join("a.md"), "배추 관수는 점적으로 30분씩.").unwrap();
        std::fs::write(dir.join("b.txt"), "사과 적과는 만개 후 한 달 안에.").unwrap();
        std::fs::write(dir.join("c.md"), "포도 봉지 씌우기는 착색 전에.").unwrap();
        std::fs::write(dir.join("ignored.csv"), "x,y").unwrap();
    }

    #[tokio::test]
    async fn test_build_memory_backend() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_kb(tmp.path());
        let cfg = config_for(tmp.path(), "memory", &tmp.path().join("db.sqlite"));

        let index = build_index(&cfg, &StubEmbedder, false).await.unwrap();
        assert_eq!(index.backend, "memory-build");
        assert_eq!(index.document_count, 3);
        assert_eq!(index.chunk_count, 3);
        assert_eq!(index.store.chunk_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_build_is_deterministic() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_kb(tmp.path());
        let cfg = config_for(tmp.path(), "memory", &tmp.path().join("db.sqlite"));

        let first = build_index(&cfg, &StubEmbedder, false).await.unwrap();
        let second = build_index(&cfg, &StubEmbedder, false).await.unwrap();
        assert_eq!(first.chunk_count, second.chunk_count);
        assert_ne!(first.generation, second.generation);
    }

    #[tokio::test]
    async fn test_sqlite_build_then_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_kb(tmp.path());
        let db = tmp.path().join("db.sqlite");
        let cfg = config_for(tmp.path(), "sqlite", &db);

        let built = build_index(&cfg, &StubEmbedder, false).await.unwrap();
        assert_eq!(built.backend, "sqlite-build");

        let loaded = build_index(&cfg, &StubEmbedder, false).await.unwrap();
        assert_eq!(loaded.backend, "sqlite-load");
        assert_eq!(loaded.chunk_count, built.chunk_count);

        let rebuilt = build_index(&cfg, &StubEmbedder, true).await.unwrap();
        assert_eq!(rebuilt.backend, "sqlite-build");
    }

    #[tokio::test]
    async fn test_auto_falls_back_when_sqlite_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_kb(tmp.path());
        // A directory path cannot be opened as a database file.
        let cfg = config_for(tmp.path(), "auto", tmp.path());

        let index = build_index(&cfg, &StubEmbedder, false).await.unwrap();
        assert_eq!(index.backend, "memory-build");
    }

    #[tokio::test]
    async fn test_missing_dir_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let cfg = config_for(&missing, "memory", &tmp.path().join("db.sqlite"));
        let err = build_index(&cfg, &StubEmbedder, false).await.unwrap_err();
        assert!(matches!(err, IndexBuildError::MissingDirectory(_)));
    }

    #[tokio::test]
    async fn test_empty_dir_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = config_for(tmp.path(), "memory", &tmp.path().join("db.sqlite"));
        let err = build_index(&cfg, &StubEmbedder, false).await.unwrap_err();
        assert!(matches!(err, IndexBuildError::NoDocuments(_)));
    }
}
