//! Index store operations: chunk upsert, embedding attachment, per-file deletion,
//! and the two read paths (full vector scan, FTS5 keyword match).
//!
//! Every write keeps `chunks_fts` in lockstep with `chunks` inside the caller's
//! unit of work. Callers own the transaction.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::types::Chunk;
use crate::memory::{content_hash, decode_vector, encode_vector};

/// Insert a chunk unless one with the same path, start line, and content hash exists.
///
/// Returns `(chunk_id, created)`.
pub fn upsert_chunk(
    conn: &Connection,
    file_path: &str,
    content: &str,
    line_start: usize,
    line_end: usize,
) -> rusqlite::Result<(i64, bool)> {
    let hash = content_hash(content);

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM chunks WHERE file_path = ?1 AND line_start = ?2 AND content_hash = ?3",
            params![file_path, line_start as i64, hash],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok((id, false));
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO chunks (file_path, line_start, line_end, content, content_hash, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            file_path,
            line_start as i64,
            line_end as i64,
            content,
            hash,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    insert_fts(conn, id, content)?;

    Ok((id, true))
}

/// Store the vector for a chunk as a little-endian f32 blob.
pub fn attach_embedding(
    conn: &Connection,
    chunk_id: i64,
    vector: &[f32],
    model: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO embeddings (chunk_id, embedding, model) VALUES (?1, ?2, ?3)",
        params![chunk_id, encode_vector(vector), model],
    )?;
    Ok(())
}

/// Delete every chunk stored for `file_path`. Embeddings go with them via cascade.
///
/// Returns the number of chunks removed.
pub fn delete_chunks_for_file(conn: &Connection, file_path: &str) -> rusqlite::Result<usize> {
    let rows: Vec<(i64, String)> = {
        let mut stmt = conn.prepare("SELECT id, content FROM chunks WHERE file_path = ?1")?;
        let rows = stmt
            .query_map(params![file_path], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    for (id, content) in &rows {
        delete_fts(conn, *id, content)?;
    }
    conn.execute("DELETE FROM chunks WHERE file_path = ?1", params![file_path])?;

    Ok(rows.len())
}

/// All stored vectors, in chunk id order. Blobs that do not decode are skipped.
pub fn scan_all(conn: &Connection) -> rusqlite::Result<Vec<(i64, Vec<f32>)>> {
    let mut stmt = conn.prepare("SELECT chunk_id, embedding FROM embeddings ORDER BY chunk_id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, blob)| match decode_vector(&blob) {
            Some(v) => Some((id, v)),
            None => {
                tracing::warn!(chunk_id = id, len = blob.len(), "skipping malformed vector blob");
                None
            }
        })
        .collect())
}

/// FTS5 BM25 keyword match. Returns `(chunk_id, relevance)` pairs, higher is better.
///
/// `fts_query` must already be escaped. A query FTS5 rejects yields an empty result.
pub fn keyword_match(conn: &Connection, fts_query: &str, limit: usize) -> Vec<(i64, f64)> {
    if fts_query.trim().is_empty() {
        return Vec::new();
    }
    match run_keyword_match(conn, fts_query, limit) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(query = fts_query, error = %e, "keyword query failed");
            Vec::new()
        }
    }
}

fn run_keyword_match(
    conn: &Connection,
    fts_query: &str,
    limit: usize,
) -> rusqlite::Result<Vec<(i64, f64)>> {
    // bm25() is negative; more negative is more relevant
    let mut stmt = conn.prepare(
        "SELECT rowid, bm25(chunks_fts) AS rank FROM chunks_fts \
         WHERE chunks_fts MATCH ?1 ORDER BY rank LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![fts_query, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, -row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Batch-fetch chunk rows by id.
pub fn fetch_chunks(conn: &Connection, ids: &[i64]) -> rusqlite::Result<HashMap<i64, Chunk>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT id, file_path, line_start, line_end, content, content_hash \
         FROM chunks WHERE id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(Chunk {
                id: row.get(0)?,
                file_path: row.get(1)?,
                line_start: row.get(2)?,
                line_end: row.get(3)?,
                content: row.get(4)?,
                content_hash: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

/// Chunks for one file, in line order.
pub fn chunks_for_file(conn: &Connection, file_path: &str) -> rusqlite::Result<Vec<Chunk>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_path, line_start, line_end, content, content_hash \
         FROM chunks WHERE file_path = ?1 ORDER BY line_start, id",
    )?;
    let rows = stmt
        .query_map(params![file_path], |row| {
            Ok(Chunk {
                id: row.get(0)?,
                file_path: row.get(1)?,
                line_start: row.get(2)?,
                line_end: row.get(3)?,
                content: row.get(4)?,
                content_hash: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_chunks(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
}

pub fn count_embeddings(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
}

/// Sync the FTS5 index after inserting into `chunks`. Must use the chunk's rowid.
fn insert_fts(conn: &Connection, rowid: i64, content: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO chunks_fts (rowid, content) VALUES (?1, ?2)",
        params![rowid, content],
    )?;
    Ok(())
}

/// Remove a chunk's FTS5 entry. External-content tables need the original text.
fn delete_fts(conn: &Connection, rowid: i64, content: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO chunks_fts (chunks_fts, rowid, content) VALUES ('delete', ?1, ?2)",
        params![rowid, content],
    )?;
    Ok(())
}
