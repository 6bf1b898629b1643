use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

use crate::db::migrations;

/// Index store statistics, as printed by `mnemo status`.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub total_chunks: u64,
    pub total_files: u64,
    pub total_embeddings: u64,
    pub schema_version: u32,
    /// Model that last wrote vectors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub db_size_bytes: u64,
    pub recent_files: Vec<RecentFile>,
}

/// A file ordered by the newest chunk stored for it.
#[derive(Debug, Serialize)]
pub struct RecentFile {
    pub file_path: String,
    pub chunks: u64,
    pub last_updated: String,
}

/// Compute index statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn index_stats(conn: &Connection, db_path: Option<&Path>, recent: usize) -> Result<IndexStats> {
    let (total_chunks, total_files): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT file_path) FROM chunks",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let total_embeddings: i64 =
        conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(IndexStats {
        total_chunks: total_chunks as u64,
        total_files: total_files as u64,
        total_embeddings: total_embeddings as u64,
        schema_version: migrations::get_schema_version(conn)?,
        embedding_model: migrations::get_embedding_model(conn)?,
        db_size_bytes,
        recent_files: recent_files(conn, recent)?,
    })
}

fn recent_files(conn: &Connection, limit: usize) -> Result<Vec<RecentFile>> {
    let mut stmt = conn.prepare(
        "SELECT file_path, COUNT(*), MAX(created_at) AS last_updated FROM chunks \
         GROUP BY file_path ORDER BY last_updated DESC, file_path LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RecentFile {
                file_path: row.get(0)?,
                chunks: row.get::<_, i64>(1)? as u64,
                last_updated: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
