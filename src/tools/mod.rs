pub mod memory_get;
pub mod memory_index;
pub mod memory_search;
pub mod memory_write;

use std::sync::{Arc, Mutex};

use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::config::MnemoConfig;
use crate::db::StoreError;
use crate::embedding::EmbeddingProvider;
use crate::notes::NoteError;

/// Why a tool call produced an `{error}` payload instead of a result.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0} is required")]
    MissingArgument(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Internal(String),
}

impl From<NoteError> for ToolError {
    fn from(e: NoteError) -> Self {
        match e {
            NoteError::NotFound(_) => Self::NotFound(e.to_string()),
            NoteError::OutsideRoot(_) => Self::InvalidArguments(e.to_string()),
            NoteError::Io { .. } => Self::Io(e.to_string()),
        }
    }
}

/// Wrap a tool payload as one pretty-printed text block. It is flagged as an
/// error when it carries a non-null `error`.
pub fn payload_result(payload: &Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    let content = vec![Content::text(text)];
    if payload.get("error").is_some_and(|e| !e.is_null()) {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

/// The memory tool handler. Holds the config and embedding provider; opens the
/// store per call.
#[derive(Clone)]
pub struct MemoryTools {
    config: Arc<MnemoConfig>,
    embedding: Arc<dyn EmbeddingProvider>,
    /// Serialises in-process writers (memory_index).
    ingest_gate: Arc<Mutex<()>>,
}

impl MemoryTools {
    pub fn new(config: Arc<MnemoConfig>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            embedding,
            ingest_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &MnemoConfig {
        &self.config
    }

    pub fn embedding(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding
    }

    pub fn descriptors() -> Vec<Tool> {
        vec![
            Tool::new(
                "memory_search",
                "Search memories using hybrid semantic + keyword search. Returns ranked results with file paths, line numbers, and relevance scores.",
                input_schema::<memory_search::MemorySearchParams>(),
            )
            .annotate(ToolAnnotations::new().read_only(true)),
            Tool::new(
                "memory_get",
                "Retrieve specific content from a memory file by path and line range.",
                input_schema::<memory_get::MemoryGetParams>(),
            )
            .annotate(ToolAnnotations::new().read_only(true)),
            Tool::new(
                "memory_index",
                "Trigger re-indexing of memory files. Run this after adding or modifying memory files.",
                input_schema::<memory_index::MemoryIndexParams>(),
            ),
            Tool::new(
                "memory_write",
                "Write content to memory. Use 'daily' for session notes, 'longterm' for important persistent facts.",
                input_schema::<memory_write::MemoryWriteParams>(),
            ),
        ]
    }

    /// Dispatch a tool by name. Blocking: async callers go through [`Self::call_async`].
    pub fn call(&self, name: &str, arguments: Value) -> CallToolResult {
        let payload = match name {
            "memory_search" => parse_arguments(arguments).and_then(|p| memory_search::run(self, p)),
            "memory_get" => parse_arguments(arguments).and_then(|p| memory_get::run(self, p)),
            "memory_index" => parse_arguments(arguments).and_then(|p| memory_index::run(self, p)),
            "memory_write" => parse_arguments(arguments).and_then(|p| memory_write::run(self, p)),
            _ => {
                tracing::warn!(tool = name, "unknown tool");
                return CallToolResult::error(vec![Content::text(format!("Unknown tool: {name}"))]);
            }
        };

        let payload = payload.unwrap_or_else(|e| {
            tracing::warn!(tool = name, error = %e, "tool call failed");
            json!({ "error": e.to_string() })
        });
        payload_result(&payload)
    }

    /// Run [`Self::call`] on the blocking pool (store and embedding I/O are synchronous).
    pub async fn call_async(&self, name: String, arguments: Value) -> anyhow::Result<CallToolResult> {
        let tools = self.clone();
        let result = tokio::task::spawn_blocking(move || tools.call(&name, arguments)).await?;
        Ok(result)
    }
}

fn parse_arguments<P: DeserializeOwned>(arguments: Value) -> Result<P, ToolError> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// JSON Schema for a params struct, without the `$schema` marker.
fn input_schema<P: JsonSchema>() -> Arc<JsonObject> {
    let mut schema = match Value::from(schemars::schema_for!(P)) {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    schema.remove("$schema");
    Arc::new(schema)
}

/// Accept a JSON integer or float for a count, truncating fractions.
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n as usize)),
        Some(n) => Err(serde::de::Error::custom(format!(
            "expected a non-negative number, got {n}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    struct NoEmbedder;

    impl EmbeddingProvider for NoEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Timeout)
        }

        fn model_name(&self) -> &str {
            "none"
        }
    }

    fn tools_at(root: &std::path::Path) -> MemoryTools {
        let mut config = MnemoConfig::default();
        config.storage.root = root.to_string_lossy().into_owned();
        MemoryTools::new(Arc::new(config), Arc::new(NoEmbedder))
    }

    fn text(result: &CallToolResult) -> &str {
        &result.content[0].as_text().unwrap().text
    }

    fn payload(result: &CallToolResult) -> Value {
        serde_json::from_str(text(result)).unwrap()
    }

    #[test]
    fn descriptors_list_four_tools_with_schemas() {
        let tools = MemoryTools::descriptors();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(names, vec!["memory_search", "memory_get", "memory_index", "memory_write"]);

        let search = &tools[0].input_schema;
        assert_eq!(search["type"], "object");
        assert!(search.get("$schema").is_none());
        assert_eq!(search["required"], json!(["query"]));
        assert!(search["properties"]["maxResults"].is_object());
        assert!(search["properties"]["minScore"].is_object());

        let get = &tools[1].input_schema;
        assert_eq!(get["required"], json!(["path"]));

        let write = &tools[3].input_schema;
        assert_eq!(write["required"], json!(["content"]));
    }

    #[test]
    fn unknown_tool_is_error_text() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = tools_at(tmp.path()).call("memory_delete", json!({}));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text(&result), "Unknown tool: memory_delete");
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = tools_at(tmp.path()).call("memory_get", json!({"path": "a.md", "bogus": 1}));
        assert_eq!(result.is_error, Some(true));
        assert!(payload(&result)["error"].as_str().unwrap().starts_with("Invalid arguments"));
    }

    #[test]
    fn numeric_arguments_accept_floats() {
        let p: memory_get::MemoryGetParams =
            parse_arguments(json!({"path": "a.md", "from": 5.0, "lines": 3})).unwrap();
        assert_eq!(p.from, Some(5));
        assert_eq!(p.lines, Some(3));

        assert!(parse_arguments::<memory_get::MemoryGetParams>(json!({"path": "a.md", "from": -1}))
            .is_err());
    }

    #[test]
    fn null_error_is_not_flagged() {
        let ok = payload_result(&json!({"success": true, "error": null}));
        assert_eq!(ok.is_error, Some(false));
        let bad = payload_result(&json!({"error": "boom"}));
        assert_eq!(bad.is_error, Some(true));
    }

    #[test]
    fn call_result_serializes_camel_case() {
        let v = serde_json::to_value(payload_result(&json!({"a": 1}))).unwrap();
        assert_eq!(v["isError"], false);
        assert_eq!(v["content"][0]["type"], "text");
        assert!(v.get("structuredContent").is_none());
    }
}
