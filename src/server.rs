//! HTTP layer.
//!
//! Thin plumbing over the core: request marshaling, the fixed rejection
//! message for irrelevant transcripts, and the grounding bundle handed to
//! the downstream summarization collaborator. No decision logic lives
//! here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/healthz` | Service status, active backend, index generation |
//! | `GET`  | `/texts` | List transcript files under the text directory |
//! | `POST` | `/summarise` | Gate + analyse + retrieve for inline text |
//! | `POST` | `/summarise_file` | Same, for a transcript file (latest by default) |
//! | `POST` | `/summarise_auto` | Inline text or file, whichever is supplied |
//! | `POST` | `/ingest` | Rebuild the knowledge index and reload the lexicon |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "filename must be a base name" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `retrieval_error`
//! (502), `index_build_error` (500), `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::extract::{analyse, HintOverrides, Hints};
use crate::retrieve::retrieve;
use crate::state::{AppState, ReloadError};
use crate::store::ScoredChunk;

/// Fixed response for transcripts the domain gate rejects.
pub const REJECT_MSG: &str = "해당 내용은 분석결과 영농일지와 관련없는 내용으로 판단됩니다.\n\
영농일지/농업 관련 내용을 말해주세요.";

/// Start the HTTP server on the configured bind address.
pub async fn run_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/healthz", get(handle_healthz))
        .route("/texts", get(handle_texts))
        .route("/summarise", post(handle_summarise))
        .route("/summarise_file", post(handle_summarise_file))
        .route("/summarise_auto", post(handle_summarise_auto))
        .route("/ingest", post(handle_ingest))
        .layer(cors)
        .with_state(state);

    info!(addr = %bind_addr, "farmlog server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn retrieval_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "retrieval_error".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Request / response models ============

#[derive(Deserialize)]
struct SummariseRequest {
    stt_text: String,
    date_hint: Option<NaiveDate>,
    crop_hint: Option<String>,
    location_hint: Option<String>,
}

#[derive(Deserialize)]
struct SummariseFileRequest {
    filename: Option<String>,
    date_hint: Option<NaiveDate>,
    crop_hint: Option<String>,
    location_hint: Option<String>,
}

#[derive(Deserialize)]
struct SummariseAutoRequest {
    path: Option<String>,
    stt_text: Option<String>,
    date_hint: Option<NaiveDate>,
}

#[derive(Deserialize, Default)]
struct IngestRequest {
    #[serde(default)]
    force: bool,
}

/// The grounding bundle consumed by the external summarization
/// collaborator: hints plus the ranked context chunks.
#[derive(Serialize)]
struct GroundingResponse {
    hints: Hints,
    backend: String,
    generation: Uuid,
    chunks: Vec<ScoredChunk>,
}

#[derive(Serialize)]
struct TextInfo {
    name: String,
    size: u64,
    mtime: String,
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: String,
    generation: Uuid,
    chunk_count: usize,
    document_count: usize,
    keyword_count: usize,
    embedding_model: String,
}

async fn handle_healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let index = state.index();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: index.backend.clone(),
        generation: index.generation,
        chunk_count: index.chunk_count,
        document_count: index.document_count,
        keyword_count: state.lexicon().len(),
        embedding_model: state.embedder.model_name().to_string(),
    })
}

async fn handle_texts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TextInfo>>, AppError> {
    let entries = list_text_files(&state.config.kb.text_dir)
        .map_err(|e| internal(format!("failed to list text dir: {}", e)))?;
    Ok(Json(
        entries
            .into_iter()
            .map(|(name, size, mtime)| TextInfo {
                name,
                size,
                mtime: format_mtime(mtime),
            })
            .collect(),
    ))
}

async fn handle_summarise(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummariseRequest>,
) -> Result<Response, AppError> {
    let overrides = HintOverrides {
        date: req.date_hint,
        crop: req.crop_hint,
        location: req.location_hint,
    };
    run_with_analysis(&state, &req.stt_text, overrides).await
}

async fn handle_summarise_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummariseFileRequest>,
) -> Result<Response, AppError> {
    let filename = match req.filename {
        Some(name) => name,
        None => latest_text_file(&state.config.kb.text_dir)?,
    };
    let stt_text = read_text_file_safe(&state.config.kb.text_dir, &filename)?;
    let overrides = HintOverrides {
        date: req.date_hint,
        crop: req.crop_hint,
        location: req.location_hint,
    };
    run_with_analysis(&state, &stt_text, overrides).await
}

async fn handle_summarise_auto(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummariseAutoRequest>,
) -> Result<Response, AppError> {
    let stt_text = match (&req.path, &req.stt_text) {
        (Some(path), _) => {
            let filename = normalise_to_basename(path)?;
            read_text_file_safe(&state.config.kb.text_dir, &filename)?
        }
        (None, Some(text)) => text.trim().to_string(),
        (None, None) => return Err(bad_request("either path or stt_text is required")),
    };
    let overrides = HintOverrides {
        date: req.date_hint,
        ..Default::default()
    };
    run_with_analysis(&state, &stt_text, overrides).await
}

async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    body: Option<Json<IngestRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let summary = state.reload(req.force).await.map_err(|e| match e {
        ReloadError::Config(err) => internal(format!("lexicon reload failed: {}", err)),
        ReloadError::Index(err) => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "index_build_error".to_string(),
            message: err.to_string(),
        },
    })?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "backend": summary.backend,
        "generation": summary.generation,
        "chunk_count": summary.chunk_count,
        "document_count": summary.document_count,
        "keyword_count": summary.keyword_count,
    })))
}

// ============ Shared gate → analyse → retrieve flow ============

/// The request-level pipeline: gate first (fixed rejection message on
/// irrelevant input, no retrieval work), then hints, then grounding
/// retrieval.
async fn run_with_analysis(
    state: &AppState,
    stt_text: &str,
    overrides: HintOverrides,
) -> Result<Response, AppError> {
    let lexicon = state.lexicon();
    let today = Local::now().date_naive();
    let hints = analyse(stt_text, &lexicon, &overrides, today);

    if !hints.is_relevant {
        return Ok(REJECT_MSG.into_response());
    }

    let index = state.index();
    let retrieval = retrieve(
        index.as_ref(),
        state.embedder.as_ref(),
        &hints.query,
        state.config.retrieval.top_k,
    )
    .await
    .map_err(|e| retrieval_error(e.to_string()))?;

    Ok(Json(GroundingResponse {
        hints,
        backend: retrieval.backend,
        generation: retrieval.generation,
        chunks: retrieval.hits,
    })
    .into_response())
}

// ============ Transcript-file helpers ============

fn list_text_files(dir: &Path) -> std::io::Result<Vec<(String, u64, std::time::SystemTime)>> {
    std::fs::create_dir_all(dir)?;
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let mtime = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        out.push((name, meta.len(), mtime));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

fn format_mtime(mtime: std::time::SystemTime) -> String {
    DateTime::<Local>::from(mtime)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

fn latest_text_file(dir: &Path) -> Result<String, AppError> {
    let mut entries = list_text_files(dir)
        .map_err(|e| internal(format!("failed to list text dir: {}", e)))?;
    entries.sort_by(|a, b| b.2.cmp(&a.2));
    entries
        .into_iter()
        .next()
        .map(|(name, _, _)| name)
        .ok_or_else(|| not_found("no .txt files under the text directory"))
}

/// Reject anything that could escape the text directory.
fn normalise_to_basename(path: &str) -> Result<String, AppError> {
    let base = Path::new(path.trim())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if base.is_empty() || base.contains("..") || base.contains('/') || base.contains('\\') {
        return Err(bad_request("invalid path"));
    }
    Ok(base)
}

fn read_text_file_safe(dir: &Path, filename: &str) -> Result<String, AppError> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(bad_request("filename must be a base name under the text directory"));
    }
    let path = dir.join(filename);
    if !path.exists() {
        return Err(not_found(format!("file not found: {}", filename)));
    }
    std::fs::read_to_string(&path).map_err(|e| internal(format!("failed to read file: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_to_basename() {
        assert_eq!(normalise_to_basename("note.txt").unwrap(), "note.txt");
        assert_eq!(normalise_to_basename("  dir/note.txt ").unwrap(), "note.txt");
        assert!(normalise_to_basename("").is_err());
        assert!(normalise_to_basename("..").is_err());
    }

    #[test]
    fn test_read_text_file_safe_rejects_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(read_text_file_safe(dir.path(), "../etc/passwd").is_err());
        assert!(read_text_file_safe(dir.path(), "a/b.txt").is_err());
        assert!(read_text_file_safe(dir.path(), "missing.txt").is_err());
    }

    #[test]
    fn test_list_text_files_filters_and_sorts() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("skip.md"), "md").unwrap();
        let entries = list_text_files(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
