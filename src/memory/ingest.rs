//! Write path: read a file, chunk it, upsert each chunk, and embed the new ones.
//!
//! [`IngestPipeline::ingest`] is the single-file entry point and
//! [`IngestPipeline::ingest_batch`] the multi-file one. A file is processed in one
//! transaction with a savepoint per chunk, so a chunk whose embedding fails is rolled
//! back on its own and the rest of the file still lands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::config::{ChunkingConfig, MnemoConfig};
use crate::db::migrations;
use crate::embedding::EmbeddingProvider;
use crate::memory::chunker::chunk_text;
use crate::memory::store;
use crate::memory::types::IngestReport;

/// The sole writer of chunks and embeddings.
#[derive(Clone)]
pub struct IngestPipeline {
    root: PathBuf,
    chunking: ChunkingConfig,
    embedder: Arc<dyn EmbeddingProvider>,
}

/// Outcome of a multi-file run.
#[derive(Debug, Default)]
pub struct IndexRun {
    pub reports: Vec<IngestReport>,
    /// `(path, error)` for files that could not be ingested at all.
    pub failures: Vec<(String, String)>,
    pub total_chunks: usize,
}

impl IndexRun {
    pub fn chunks_added(&self) -> usize {
        self.reports.iter().map(|r| r.chunks_added).sum()
    }

    /// Human-readable summary, one line per file plus the store total.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for report in &self.reports {
            let _ = writeln!(out, "{}", report_line(report));
        }
        for (path, error) in &self.failures {
            let _ = writeln!(out, "Failed {}: {}", display_name(path), error);
        }
        let _ = write!(out, "\nTotal chunks in database: {}", self.total_chunks);
        out
    }
}

/// `Indexed <name>: N added, M skipped`
pub fn report_line(report: &IngestReport) -> String {
    let mut line = format!(
        "Indexed {}: {} added, {} skipped",
        display_name(&report.file_path),
        report.chunks_added,
        report.chunks_skipped
    );
    if report.chunks_failed > 0 {
        let _ = write!(line, ", {} failed", report.chunks_failed);
    }
    line
}

fn display_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

impl IngestPipeline {
    pub fn new(root: PathBuf, chunking: ChunkingConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            root,
            chunking,
            embedder,
        }
    }

    pub fn from_config(config: &MnemoConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(config.root(), config.chunking.clone(), embedder)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Anchor a relative path at the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Stable identifier stored with each chunk: the path relative to the root.
    pub fn relative_path(&self, path: &Path) -> String {
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| self.resolve(path));
        match absolute.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => absolute.to_string_lossy().into_owned(),
        }
    }

    /// Ingest one file. With `force`, every stored chunk for the file is deleted first.
    pub fn ingest(&self, conn: &mut Connection, path: &Path, force: bool) -> Result<IngestReport> {
        let path = self.resolve(path);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_path = self.relative_path(&path);
        let model = self.embedder.model_name().to_string();

        let mut report = IngestReport {
            file_path: file_path.clone(),
            ..Default::default()
        };

        let mut tx = conn.transaction()?;

        if force {
            let removed = store::delete_chunks_for_file(&tx, &file_path)?;
            tracing::debug!(path = %file_path, removed, "cleared chunks for rebuild");
        }

        for draft in chunk_text(&text, &self.chunking) {
            let sp = tx.savepoint()?;
            let (chunk_id, created) =
                store::upsert_chunk(&sp, &file_path, &draft.content, draft.line_start, draft.line_end)?;

            if !created {
                report.chunks_skipped += 1;
                sp.commit()?;
                continue;
            }

            match self.embedder.embed(&draft.content) {
                Ok(vector) => {
                    store::attach_embedding(&sp, chunk_id, &vector, &model)?;
                    sp.commit()?;
                    report.chunks_added += 1;
                }
                Err(e) => {
                    // dropping the savepoint rolls the chunk and its FTS entry back
                    tracing::warn!(
                        path = %file_path,
                        line_start = draft.line_start,
                        error = %e,
                        "embedding failed, chunk dropped"
                    );
                    drop(sp);
                    report.chunks_failed += 1;
                }
            }
        }

        if report.chunks_added > 0 {
            migrations::set_embedding_model(&tx, &model)?;
        }
        tx.commit()?;

        tracing::info!(
            path = %file_path,
            added = report.chunks_added,
            skipped = report.chunks_skipped,
            failed = report.chunks_failed,
            "ingested"
        );
        Ok(report)
    }

    /// Ingest each path in order. A file that fails is recorded and the run continues.
    pub fn ingest_batch(&self, conn: &mut Connection, paths: &[PathBuf], force: bool) -> Result<IndexRun> {
        let mut run = IndexRun::default();
        for path in paths {
            match self.ingest(conn, path, force) {
                Ok(report) => run.reports.push(report),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "ingest failed");
                    run.failures.push((path.to_string_lossy().into_owned(), format!("{e:#}")));
                }
            }
        }
        run.total_chunks = store::count_chunks(conn)?;
        Ok(run)
    }
}

/// The default document set: the memory file (if present), then every markdown file
/// under the memory directory, recursively, in lexicographic path order.
pub fn discover(memory_file: &Path, memory_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if memory_file.is_file() {
        files.push(memory_file.to_path_buf());
    }

    let mut notes: Vec<PathBuf> = WalkDir::new(memory_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    notes.sort();
    files.extend(notes);
    files
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::embedding::EmbeddingError;
    use tempfile::TempDir;

    struct FixedEmbedder;

    impl EmbeddingProvider for FixedEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("POISON") {
                return Err(EmbeddingError::Malformed("refused".into()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn pipeline(root: &Path) -> IngestPipeline {
        IngestPipeline::new(
            std::fs::canonicalize(root).unwrap(),
            ChunkingConfig::default(),
            Arc::new(FixedEmbedder),
        )
    }

    #[test]
    fn ingest_stores_relative_path_and_model() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("MEMORY.md"), "# Memory\n\nfacts\n").unwrap();
        let mut conn = db::open_in_memory().unwrap();

        let report = pipeline(tmp.path())
            .ingest(&mut conn, Path::new("MEMORY.md"), false)
            .unwrap();

        assert_eq!(report.file_path, "MEMORY.md");
        assert_eq!(report.chunks_added, 1);
        assert_eq!(
            migrations::get_embedding_model(&conn).unwrap().as_deref(),
            Some("fixed")
        );
    }

    #[test]
    fn failed_embedding_drops_only_that_chunk() {
        let tmp = TempDir::new().unwrap();
        // zero overlap so the poisoned line lands in exactly one chunk
        let good = vec!["one two three four five six seven eight nine ten"; 30].join("\n");
        let text = format!("{good}\nPOISON one two three four five six seven eight nine ten\n");
        std::fs::write(tmp.path().join("notes.md"), text).unwrap();
        let mut conn = db::open_in_memory().unwrap();

        let mut p = pipeline(tmp.path());
        p.chunking.overlap_tokens = 0;
        let report = p.ingest(&mut conn, Path::new("notes.md"), false).unwrap();

        assert_eq!(report.chunks_added, 1);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(store::count_chunks(&conn).unwrap(), 1);
        assert_eq!(store::count_embeddings(&conn).unwrap(), 1);
        assert!(store::keyword_match(&conn, "POISON", 10).is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut conn = db::open_in_memory().unwrap();
        assert!(pipeline(tmp.path())
            .ingest(&mut conn, Path::new("nope.md"), false)
            .is_err());
    }

    #[test]
    fn discover_orders_memory_file_then_sorted_notes() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("memory");
        std::fs::create_dir_all(dir.join("topics")).unwrap();
        std::fs::write(tmp.path().join("MEMORY.md"), "x").unwrap();
        std::fs::write(dir.join("2026-01-02.md"), "x").unwrap();
        std::fs::write(dir.join("2026-01-01.md"), "x").unwrap();
        std::fs::write(dir.join("topics/rust.md"), "x").unwrap();
        std::fs::write(dir.join("scratch.txt"), "x").unwrap();

        let files = discover(&tmp.path().join("MEMORY.md"), &dir);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "MEMORY.md",
                "memory/2026-01-01.md",
                "memory/2026-01-02.md",
                "memory/topics/rust.md"
            ]
        );
    }

    #[test]
    fn discover_tolerates_missing_inputs() {
        let tmp = TempDir::new().unwrap();
        assert!(discover(&tmp.path().join("MEMORY.md"), &tmp.path().join("memory")).is_empty());
    }

    #[test]
    fn batch_continues_past_missing_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "alpha\n").unwrap();
        let mut conn = db::open_in_memory().unwrap();

        let run = pipeline(tmp.path())
            .ingest_batch(
                &mut conn,
                &[PathBuf::from("missing.md"), PathBuf::from("a.md")],
                false,
            )
            .unwrap();

        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.reports.len(), 1);
        assert_eq!(run.total_chunks, 1);
        let out = run.render();
        assert!(out.contains("Indexed a.md: 1 added, 0 skipped"));
        assert!(out.contains("Failed missing.md"));
        assert!(out.ends_with("Total chunks in database: 1"));
    }
}
