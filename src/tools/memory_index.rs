//! `memory_index` tool: run the ingestion pipeline over one file or the default set.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{MemoryTools, ToolError};
use crate::db;
use crate::memory::ingest::{self, IngestPipeline};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MemoryIndexParams {
    #[schemars(description = "Optional: specific file to index (indexes all if omitted)")]
    pub path: Option<String>,

    #[serde(default)]
    #[schemars(description = "Whether to rebuild the entire index from scratch")]
    pub rebuild: bool,
}

pub(super) fn run(tools: &MemoryTools, params: MemoryIndexParams) -> Result<Value, ToolError> {
    let config = tools.config();

    let paths: Vec<PathBuf> = match params.path.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => vec![PathBuf::from(p)],
        _ => ingest::discover(&config.resolved_memory_file(), &config.resolved_memory_dir()),
    };

    tracing::info!(files = paths.len(), rebuild = params.rebuild, "memory_index called");

    let _gate = tools
        .ingest_gate
        .lock()
        .map_err(|e| ToolError::Internal(format!("ingest lock poisoned: {e}")))?;

    let mut conn = db::open_database(config.resolved_db_path())
        .map_err(|e| ToolError::Internal(format!("{e:#}")))?;
    let pipeline = IngestPipeline::from_config(config, tools.embedding().clone());
    let run = pipeline
        .ingest_batch(&mut conn, &paths, params.rebuild)
        .map_err(|e| ToolError::Internal(format!("{e:#}")))?;

    let error = if run.failures.is_empty() {
        Value::Null
    } else {
        let lines: Vec<String> = run
            .failures
            .iter()
            .map(|(path, err)| format!("{path}: {err}"))
            .collect();
        Value::String(lines.join("\n"))
    };

    Ok(json!({
        "success": run.failures.is_empty(),
        "output": run.render(),
        "error": error,
    }))
}
