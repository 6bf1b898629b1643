//! Local-first hybrid retrieval over markdown agent memory.
//!
//! mnemo indexes a long-term memory file (`MEMORY.md`) and a directory of daily and
//! topical notes (`memory/**/*.md`) into a single SQLite database, then answers
//! queries by fusing cosine similarity over stored embeddings with FTS5 BM25 keyword
//! relevance. Agents reach it through four tools served over a `Content-Length`
//! framed JSON-RPC connection on stdio.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with an external-content FTS5 table and little-endian `f32`
//!   embedding blobs
//! - **Embeddings**: HTTP providers (Ollama or any OpenAI-compatible endpoint)
//! - **Search**: `0.7 · vector + 0.3 · text`, degrading to keyword-only when the
//!   provider is unreachable
//! - **Freshness**: a debounced filesystem watcher re-ingests edited files
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: Database initialization, schema, and migrations
//! - [`embedding`]: Text-to-vector providers
//! - [`memory`]: Chunking, ingestion, storage, and hybrid search
//! - [`notes`]: Line-window reads and appends to the memory files
//! - [`tools`]: The `memory_*` tool handlers
//! - [`server`]: Stdio JSON-RPC transport
//! - [`watcher`]: Debounced re-indexing on file change

pub mod config;
pub mod db;
pub mod embedding;
pub mod memory;
pub mod notes;
pub mod server;
pub mod tools;
pub mod watcher;
