#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mnemo::config::MnemoConfig;
use mnemo::db;
use mnemo::embedding::{EmbeddingError, EmbeddingProvider};
use mnemo::memory::ingest::IngestPipeline;
use rusqlite::Connection;
use tempfile::TempDir;

pub const DIMS: usize = 64;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_in_memory().unwrap()
}

/// Deterministic bag-of-words embedder: each lowercase word bumps one of `DIMS`
/// buckets. Identical word bags embed identically.
pub struct HashEmbedder;

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(bag_of_words(text))
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        v[bucket(&word.to_lowercase())] += 1.0;
    }
    // keep empty text from producing a zero vector
    if v.iter().all(|x| *x == 0.0) {
        v[0] = 1.0;
    }
    v
}

/// FNV-1a, reduced to a bucket index.
fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMS as u64) as usize
}

/// Refuses any text containing `marker`; embeds everything else like [`HashEmbedder`].
pub struct FailingEmbedder {
    pub marker: &'static str,
}

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.contains(self.marker) {
            return Err(EmbeddingError::Status(503));
        }
        Ok(bag_of_words(text))
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }
}

/// Provider that is never reachable.
pub struct DownEmbedder;

impl EmbeddingProvider for DownEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Timeout)
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }
}

/// `n` lines of exactly ten words each (13 estimated tokens per line), numbered
/// from `first`.
pub fn ten_word_lines(first: usize, n: usize) -> Vec<String> {
    (first..first + n)
        .map(|i| format!("line{i} alpha beta gamma delta epsilon zeta eta theta iota"))
        .collect()
}

/// A temporary workspace root with an empty `memory/` directory and a config
/// pointing at it.
pub struct Workspace {
    pub dir: TempDir,
    pub config: MnemoConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("memory")).unwrap();
        let mut config = MnemoConfig::default();
        config.storage.root = dir.path().to_string_lossy().into_owned();
        Self { dir, config }
    }

    pub fn root(&self) -> PathBuf {
        self.config.root()
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root().join(rel)).unwrap()
    }

    pub fn pipeline(&self, embedder: Arc<dyn EmbeddingProvider>) -> IngestPipeline {
        IngestPipeline::from_config(&self.config, embedder)
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.resolved_db_path()
    }

    pub fn exists(&self, rel: &str) -> bool {
        Path::new(&self.root()).join(rel).exists()
    }
}
