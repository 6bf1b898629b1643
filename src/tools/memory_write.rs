use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MemoryTools, ToolError};
use crate::notes::{self, NoteFiles, WriteTarget};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MemoryWriteParams {
    #[serde(default)]
    #[schemars(description = "Where to write: 'daily' for today's log, 'longterm' for MEMORY.md")]
    pub target: WriteTarget,

    #[schemars(description = "Content to write (markdown format)")]
    pub content: String,
}

pub(super) fn run(tools: &MemoryTools, params: MemoryWriteParams) -> Result<Value, ToolError> {
    if params.content.trim().is_empty() {
        return Err(ToolError::MissingArgument("Content"));
    }

    let config = tools.config();
    let files = NoteFiles {
        root: config.root(),
        memory_file: config.resolved_memory_file(),
        memory_dir: config.resolved_memory_dir(),
    };
    let today = chrono::Local::now().date_naive();

    let outcome = notes::append_note(&files, params.target, &params.content, today)?;
    serde_json::to_value(outcome).map_err(|e| ToolError::Internal(e.to_string()))
}
