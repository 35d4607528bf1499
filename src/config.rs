use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub kb: KbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    pub server: ServerConfig,
}

/// Knowledge-base and transcript locations.
#[derive(Debug, Deserialize, Clone)]
pub struct KbConfig {
    /// Directory of plain-text / markdown knowledge documents.
    pub dir: PathBuf,
    /// Keyword file driving the domain gate.
    pub keywords_path: PathBuf,
    /// Directory of transcript `.txt` files for the file-based endpoints.
    pub text_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    800
}
fn default_overlap_chars() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Similarity-backend selection. `auto` prefers SQLite and falls back to
/// the in-memory store when SQLite cannot be initialized.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            db_path: default_db_path(),
        }
    }
}

fn default_backend() -> String {
    "auto".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/farmlog.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content)?;

    if config.chunking.chunk_chars == 0 {
        return Err(ConfigError::Invalid(
            "chunking.chunk_chars must be > 0".to_string(),
        ));
    }
    if config.chunking.overlap_chars >= config.chunking.chunk_chars {
        return Err(ConfigError::Invalid(
            "chunking.overlap_chars must be < chunking.chunk_chars".to_string(),
        ));
    }
    if config.retrieval.top_k == 0 {
        return Err(ConfigError::Invalid(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }
    match config.embedding.provider.as_str() {
        "openai" | "disabled" => {}
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown embedding provider: '{}'. Must be openai or disabled.",
                other
            )))
        }
    }
    match config.index.backend.as_str() {
        "auto" | "sqlite" | "memory" => {}
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown index backend: '{}'. Must be auto, sqlite, or memory.",
                other
            )))
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    const MINIMAL: &str = r#"
[kb]
dir = "./kb"
keywords_path = "./kb/farming_keywords.txt"
text_dir = "./text"

[server]
bind = "127.0.0.1:8000"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let f = write_config(MINIMAL);
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.chunking.chunk_chars, 800);
        assert_eq!(cfg.chunking.overlap_chars, 120);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.index.backend, "auto");
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = load_config(Path::new("/nonexistent/farmlog.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let body = format!(
            "{}\n[chunking]\nchunk_chars = 100\noverlap_chars = 100\n",
            MINIMAL
        );
        let f = write_config(&body);
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let body = format!("{}\n[index]\nbackend = \"chroma\"\n", MINIMAL);
        let f = write_config(&body);
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
