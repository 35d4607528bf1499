//! Error taxonomy for the grounding core.
//!
//! Each layer gets its own error type so callers can tell a fatal startup
//! problem apart from a recoverable per-request failure:
//!
//! | Type | Surfaced to | Recovery |
//! |------|-------------|----------|
//! | [`ConfigError`] | operator at startup | none — fix the config |
//! | [`IndexBuildError`] | caller of the re-index operation | previous generation stays live |
//! | [`BackendUnavailableError`] | nobody (logged) | automatic fallback backend |
//! | [`EmbeddingError`] | caller of `retrieve` / index build | retry at the caller's discretion |
//! | [`RetrievalError`] | caller of `retrieve` | retry at the caller's discretion |

use std::path::PathBuf;
use thiserror::Error;

/// Configuration or startup-resource failure. Fatal: the service must not
/// come up half-configured.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),

    #[error("failed to read keyword file {path}: {source}")]
    KeywordsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Knowledge-index build failure. The caller of a rebuild keeps serving the
/// previous generation.
#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("knowledge base directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("no usable documents under {0}")]
    NoDocuments(PathBuf),

    #[error("embedding failed during index build: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("storage failure during index build: {0}")]
    Storage(anyhow::Error),

    #[error("{0}")]
    Backend(#[from] BackendUnavailableError),
}

impl From<anyhow::Error> for IndexBuildError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

/// The preferred similarity backend could not be initialized. Recovered
/// locally by switching to the fallback backend; never returned to an end
/// caller.
#[derive(Debug, Error)]
#[error("backend '{backend}' unavailable: {reason}")]
pub struct BackendUnavailableError {
    pub backend: &'static str,
    pub reason: String,
}

/// Failure while talking to the external embedding service.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Failure during a retrieval call. Propagated to the caller of
/// `retrieve`, never swallowed into an empty result.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("similarity search failed: {0}")]
    Search(anyhow::Error),
}

impl From<anyhow::Error> for RetrievalError {
    fn from(err: anyhow::Error) -> Self {
        Self::Search(err)
    }
}
