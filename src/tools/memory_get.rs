//! `memory_get` tool: read a line window from a memory file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient_count, MemoryTools, ToolError};
use crate::notes;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MemoryGetParams {
    #[schemars(description = "Relative path to the memory file (e.g., 'memory/2026-01-28.md')")]
    pub path: String,

    #[serde(default, deserialize_with = "lenient_count")]
    #[schemars(with = "Option<f64>", description = "Starting line number (1-indexed, default: 1)")]
    pub from: Option<usize>,

    #[serde(default, deserialize_with = "lenient_count")]
    #[schemars(with = "Option<f64>", description = "Number of lines to retrieve (default: 50)")]
    pub lines: Option<usize>,
}

pub(super) fn run(tools: &MemoryTools, params: MemoryGetParams) -> Result<Value, ToolError> {
    if params.path.trim().is_empty() {
        return Err(ToolError::MissingArgument("Path"));
    }

    let window = notes::read_lines(
        &tools.config().root(),
        &params.path,
        params.from.unwrap_or(1),
        params.lines.unwrap_or(50),
    )?;

    serde_json::to_value(window).map_err(|e| ToolError::Internal(e.to_string()))
}
