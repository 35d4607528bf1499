//! Fixed-window text chunker.
//!
//! Splits knowledge-base documents into bounded, overlapping character
//! windows. Window length and overlap are configuration parameters; given
//! identical input and configuration the boundaries, ordering, and chunk
//! ids are fully reproducible, which is what makes repeated index builds
//! comparable.
//!
//! Each chunk's id is derived from its source document and index, plus a
//! SHA-256 hash of its text for staleness checks.

use sha2::{Digest, Sha256};

/// A bounded span of one knowledge-base document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic `"<source>#<index>"` id. Stable only within one
    /// index generation.
    pub id: String,
    /// KB-relative path of the source document.
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Split text into overlapping character windows.
///
/// `overlap_chars` must be smaller than `chunk_chars` (enforced at config
/// load). Windows advance by `chunk_chars - overlap_chars`; the final
/// partial window is kept. Whitespace-only input yields no chunks.
pub fn chunk_text(source: &str, text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_chars.saturating_sub(overlap_chars).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    while start < chars.len() {
        let end = (start + chunk_chars).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(make_chunk(source, index, trimmed));
            index += 1;
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn make_chunk(source: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}#{}", source, index),
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
