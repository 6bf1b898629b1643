use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemoConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub watcher: WatcherConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Workspace root. Stored chunk paths are relative to it.
    pub root: String,
    pub db_path: String,
    /// Long-term memory file.
    pub memory_file: String,
    /// Directory of daily and topical notes, watched recursively.
    pub memory_dir: String,
}

/// Wire shape spoken by the embedding endpoint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// `{model, prompt}` → `{embedding}`
    Ollama,
    /// `{model, input}` → `{data: [{embedding}]}`
    #[serde(alias = "openai-compatible", alias = "openai_compatible")]
    OpenAi,
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_max_results: usize,
    pub min_score: f64,
    pub vector_weight: f64,
    pub text_weight: f64,
    /// Working-set size kept from each of the vector and keyword paths before fusion.
    pub candidate_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatcherConfig {
    pub debounce_ms: u64,
    /// Ingest changed files with a forced rebuild instead of incremental upsert.
    pub rebuild: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: ".".into(),
            db_path: "db/memory.db".into(),
            memory_file: "MEMORY.md".into(),
            memory_dir: "memory".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            base_url: "http://localhost:11434/api/embeddings".into(),
            model: "nomic-embed-text".into(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 400,
            overlap_tokens: 80,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_max_results: 6,
            min_score: 0.25,
            vector_weight: 0.7,
            text_weight: 0.3,
            candidate_limit: 50,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            rebuild: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Returns `<root>/.config/mnemo.toml`.
pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(".config").join("mnemo.toml")
}

impl MnemoConfig {
    /// Load config for the workspace root given by `MNEMO_ROOT` (or the current
    /// directory), then apply env var overrides.
    pub fn load() -> Result<Self> {
        let root = std::env::var("MNEMO_ROOT").unwrap_or_else(|_| ".".into());
        Self::load_from(default_config_path(&expand_tilde(&root)))
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMO_ROOT, MNEMO_DB, MNEMO_LOG_LEVEL,
    /// MNEMO_EMBEDDING_API_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMO_ROOT") {
            self.storage.root = val;
        }
        if let Ok(val) = std::env::var("MNEMO_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMO_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MNEMO_EMBEDDING_API_KEY") {
            self.embedding.api_key = val;
        }
    }

    /// Workspace root, canonicalized when it exists.
    pub fn root(&self) -> PathBuf {
        let root = expand_tilde(&self.storage.root);
        std::fs::canonicalize(&root).unwrap_or(root)
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.resolve(&self.storage.db_path)
    }

    pub fn resolved_memory_file(&self) -> PathBuf {
        self.resolve(&self.storage.memory_file)
    }

    pub fn resolved_memory_dir(&self) -> PathBuf {
        self.resolve(&self.storage.memory_dir)
    }

    /// Expand `~` and anchor relative paths at the workspace root.
    fn resolve(&self, path: &str) -> PathBuf {
        let path = expand_tilde(path);
        if path.is_absolute() {
            path
        } else {
            self.root().join(path)
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    }
}
