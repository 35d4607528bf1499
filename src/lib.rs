//! # FarmLog
//!
//! A grounding service for transcribed farm-activity speech.
//!
//! Incoming STT text is gated for farming relevance against a
//! user-maintained keyword lexicon, scanned once for structured hints
//! (crop, location, date, a retrieval query), and grounded with context
//! chunks retrieved from a local knowledge base. The resulting bundle is
//! consumed by an external summarization collaborator that produces the
//! final structured farm-log entry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌────────────┐
//! │ STT text │──▶│ Domain     │──▶│ Hint          │──▶│ Retriever   │
//! │ or file  │   │ Gate      │   │ Extractor    │   │ (top-K)    │
//! └──────────┘   └─────┬─────┘   └──────────────┘   └─────┬──────┘
//!                      │ reject                            │
//!                      ▼                                   ▼
//!               fixed message                   grounding bundle →
//!                                               summarizer (external)
//! ```
//!
//! The knowledge index is rebuilt as a whole by the ingest operation and
//! swapped atomically; the similarity backend is SQLite when available,
//! with an in-memory fallback.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`lexicon`] | Keyword lexicon and domain gate |
//! | [`extract`] | Single-pass hint extraction |
//! | [`chunk`] | Deterministic text chunking |
//! | [`embedding`] | Embedding service abstraction |
//! | [`store`] | Chunk storage backends (SQLite / in-memory) |
//! | [`index`] | Knowledge index build and backend selection |
//! | [`retrieve`] | Top-K similarity retrieval |
//! | [`state`] | Shared lexicon/index state with atomic reload |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod lexicon;
pub mod retrieve;
pub mod server;
pub mod state;
pub mod store;
