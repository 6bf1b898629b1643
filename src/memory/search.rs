use anyhow::Result;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::memory::store;
use crate::memory::types::SearchResult;

// ── Public types ──────────────────────────────────────────────────────────────

/// Per-query knobs.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_score: f64,
    pub keyword_only: bool,
}

impl SearchOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            limit: config.default_max_results,
            min_score: config.min_score,
            keyword_only: false,
        }
    }
}

/// How a query was actually scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    Hybrid,
    KeywordOnly,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Hybrid search: FTS5 BM25 (normalized) + full-scan cosine → weighted fusion →
/// threshold → rank → truncate.
///
/// If the embedder fails, the query is scored keyword-only instead of failing.
pub fn search(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    options: &SearchOptions,
    config: &RetrievalConfig,
) -> Result<Vec<SearchResult>> {
    // 1. Keyword path
    let fts_query = escape_fts_query(query);
    let text_scores = normalize(&store::keyword_match(conn, &fts_query, config.candidate_limit));

    // 2. Vector path
    let mut mode = ScoringMode::KeywordOnly;
    let mut vector_scores = HashMap::new();
    if !options.keyword_only {
        match embedder.embed(query) {
            Ok(query_vector) => {
                vector_scores = vector_candidates(conn, &query_vector, config.candidate_limit)?;
                mode = ScoringMode::Hybrid;
            }
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, falling back to keyword-only");
            }
        }
    }

    // 3. Fusion over the union of both candidate sets
    let candidate_ids: BTreeSet<i64> = vector_scores
        .keys()
        .chain(text_scores.keys())
        .copied()
        .collect();

    let mut scored: Vec<(i64, f64, f64, f64)> = candidate_ids
        .into_iter()
        .map(|id| {
            let v = vector_scores.get(&id).copied().unwrap_or(0.0);
            let t = text_scores.get(&id).copied().unwrap_or(0.0);
            let score = match mode {
                ScoringMode::Hybrid => fuse(v, t, config),
                ScoringMode::KeywordOnly => t,
            };
            (id, score, v, t)
        })
        .filter(|(_, score, _, _)| *score >= options.min_score)
        .collect();

    // 4. Rank: score desc, then chunk id asc
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    scored.truncate(options.limit);

    // 5. Hydrate
    let ids: Vec<i64> = scored.iter().map(|(id, ..)| *id).collect();
    let chunks = store::fetch_chunks(conn, &ids)?;

    let results = scored
        .into_iter()
        .filter_map(|(id, score, vector_score, text_score)| {
            chunks.get(&id).map(|c| SearchResult {
                chunk_id: id,
                file_path: c.file_path.clone(),
                line_start: c.line_start,
                line_end: c.line_end,
                content: c.content.clone(),
                score,
                vector_score,
                text_score,
            })
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        query,
        mode = ?mode,
        keyword_hits = text_scores.len(),
        vector_hits = vector_scores.len(),
        returned = results.len(),
        "search complete"
    );

    Ok(results)
}

/// `dot(a, b) / (|a|·|b|)`, or 0 when either norm is 0 or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Weighted linear fusion of the two component scores.
pub fn fuse(vector_score: f64, text_score: f64, config: &RetrievalConfig) -> f64 {
    config.vector_weight * vector_score + config.text_weight * text_score
}

/// Min-max rescale relevance values to `[0, 1]`. Equal values use a range of 1.
pub fn normalize(hits: &[(i64, f64)]) -> HashMap<i64, f64> {
    if hits.is_empty() {
        return HashMap::new();
    }
    let max = hits.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    let min = hits.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let range = if max != min { max - min } else { 1.0 };

    hits.iter()
        .map(|(id, s)| (*id, (s - min) / range))
        .collect()
}

/// Escape a user query for FTS5 MATCH syntax.
///
/// Barewords pass through (implicit AND). Tokens with characters outside the FTS5
/// bareword set, and the operator keywords, are wrapped in double quotes with any
/// embedded quotes doubled.
pub fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| {
            if needs_quoting(word) {
                format!("\"{}\"", word.replace('"', "\"\""))
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn needs_quoting(word: &str) -> bool {
    matches!(word, "AND" | "OR" | "NOT" | "NEAR")
        || word
            .chars()
            .any(|c| !(c.is_alphanumeric() || c == '_' || !c.is_ascii()))
}

/// Full scan of stored vectors, keeping the top `limit` by cosine similarity.
fn vector_candidates(
    conn: &Connection,
    query_vector: &[f32],
    limit: usize,
) -> Result<HashMap<i64, f64>> {
    let mut skipped = 0usize;
    let mut scored: Vec<(i64, f64)> = store::scan_all(conn)?
        .into_iter()
        .filter_map(|(id, v)| {
            if v.len() != query_vector.len() {
                skipped += 1;
                return None;
            }
            Some((id, cosine_similarity(query_vector, &v)))
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(
            skipped,
            dim = query_vector.len(),
            "ignored stored vectors with a different dimension; consider `mnemo index --rebuild`"
        );
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    scored.truncate(limit);
    Ok(scored.into_iter().collect())
}
