//! `memory_search` tool: hybrid search over the index store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{lenient_count, MemoryTools, ToolError};
use crate::db;
use crate::memory::search::{self, SearchOptions};

/// Parameters for the `memory_search` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemorySearchParams {
    #[schemars(description = "The search query - can be a question or keywords")]
    pub query: String,

    #[serde(default, deserialize_with = "lenient_count")]
    #[schemars(
        with = "Option<f64>",
        description = "Maximum number of results to return (default: 6)"
    )]
    pub max_results: Option<usize>,

    #[serde(default)]
    #[schemars(description = "Minimum relevance score threshold (default: 0.25)")]
    pub min_score: Option<f64>,
}

pub(super) fn run(tools: &MemoryTools, params: MemorySearchParams) -> Result<Value, ToolError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ToolError::MissingArgument("Query"));
    }

    let config = tools.config();
    let conn = db::open_existing(config.resolved_db_path())?;

    let mut options = SearchOptions::from_config(&config.retrieval);
    if let Some(limit) = params.max_results {
        options.limit = limit;
    }
    if let Some(min_score) = params.min_score {
        options.min_score = min_score;
    }

    tracing::info!(query, limit = options.limit, min_score = options.min_score, "memory_search called");

    let results = search::search(&conn, tools.embedding().as_ref(), query, &options, &config.retrieval)
        .map_err(|e| ToolError::Internal(format!("{e:#}")))?;

    if results.is_empty() {
        return Ok(json!({ "message": "No matching memories found.", "results": [] }));
    }

    let results: Vec<_> = results.into_iter().map(|r| r.rounded()).collect();
    Ok(json!({ "results": results }))
}
