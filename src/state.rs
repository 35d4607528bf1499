//! Process-wide shared state.
//!
//! The lexicon and the knowledge index are read by every request and
//! replaced only by the explicit reload operation. Readers clone an `Arc`
//! out from under a short read lock and then work lock-free, so a reload
//! never stalls in-flight requests and no lock is ever held across an
//! await. The replacement is built completely off-lock and swapped in one
//! write each; readers observe either the previous generation or the new
//! one in full, never a mix.

use std::sync::{Arc, RwLock};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{ConfigError, IndexBuildError};
use crate::index::{build_index, KnowledgeIndex};
use crate::lexicon::Lexicon;

pub struct AppState {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn Embedder>,
    lexicon: RwLock<Arc<Lexicon>>,
    index: RwLock<Arc<KnowledgeIndex>>,
}

impl AppState {
    /// Initial startup: load the lexicon and build the first index
    /// generation. Failure here is fatal — the service must not come up
    /// with a half-initialized state.
    pub async fn init(
        config: Config,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, anyhow::Error> {
        let lexicon = Lexicon::load(&config.kb.keywords_path)?;
        if lexicon.is_empty() {
            tracing::warn!(
                path = %config.kb.keywords_path.display(),
                "lexicon is empty, the domain gate will reject everything"
            );
        }
        let index = build_index(&config, embedder.as_ref(), false).await?;

        Ok(Self {
            config: Arc::new(config),
            embedder,
            lexicon: RwLock::new(Arc::new(lexicon)),
            index: RwLock::new(Arc::new(index)),
        })
    }

    /// Current lexicon generation.
    pub fn lexicon(&self) -> Arc<Lexicon> {
        self.lexicon.read().expect("lexicon lock poisoned").clone()
    }

    /// Current index generation.
    pub fn index(&self) -> Arc<KnowledgeIndex> {
        self.index.read().expect("index lock poisoned").clone()
    }

    /// Rebuild the index and reload the lexicon, then swap both in.
    ///
    /// Everything is built before either swap, so a failure leaves the
    /// previous generations fully serviceable and a success is observed
    /// atomically per resource.
    pub async fn reload(&self, force_rebuild: bool) -> Result<ReloadSummary, ReloadError> {
        let lexicon = Lexicon::load(&self.config.kb.keywords_path).map_err(ReloadError::Config)?;
        let index = build_index(&self.config, self.embedder.as_ref(), force_rebuild)
            .await
            .map_err(ReloadError::Index)?;

        let summary = ReloadSummary {
            backend: index.backend.clone(),
            generation: index.generation,
            chunk_count: index.chunk_count,
            document_count: index.document_count,
            keyword_count: lexicon.len(),
        };

        *self.lexicon.write().expect("lexicon lock poisoned") = Arc::new(lexicon);
        *self.index.write().expect("index lock poisoned") = Arc::new(index);

        Ok(summary)
    }
}

/// What a successful reload produced, for operator feedback.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReloadSummary {
    pub backend: String,
    pub generation: uuid::Uuid,
    pub chunk_count: usize,
    pub document_count: usize,
    pub keyword_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(ConfigError),
    #[error(transparent)]
    Index(IndexBuildError),
}
