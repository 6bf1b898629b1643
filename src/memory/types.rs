//! Core value types shared by the chunker, store, search engine, and ingestion.
//!
//! [`ChunkDraft`] is what the chunker produces, [`Chunk`] is a stored row,
//! [`SearchResult`] is the query-scoped output of hybrid search, and
//! [`IngestReport`] summarises one file's ingestion.

use serde::Serialize;

/// A chunk descriptor before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub content: String,
    /// 1-indexed, inclusive.
    pub line_start: usize,
    /// 1-indexed, inclusive.
    pub line_end: usize,
}

/// A chunk row from the `chunks` table.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: i64,
    pub file_path: String,
    pub line_start: i64,
    pub line_end: i64,
    pub content: String,
    pub content_hash: String,
}

/// One ranked hit. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(skip)]
    pub chunk_id: i64,
    pub file_path: String,
    pub line_start: i64,
    pub line_end: i64,
    pub content: String,
    /// Fused score.
    pub score: f64,
    pub vector_score: f64,
    pub text_score: f64,
}

impl SearchResult {
    /// Round every score to 3 decimals for presentation.
    pub fn rounded(mut self) -> Self {
        self.score = round3(self.score);
        self.vector_score = round3(self.vector_score);
        self.text_score = round3(self.text_score);
        self
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub file_path: String,
    pub chunks_added: usize,
    pub chunks_skipped: usize,
    /// Chunks dropped because their embedding could not be produced.
    pub chunks_failed: usize,
}
