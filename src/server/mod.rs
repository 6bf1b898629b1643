//! Stdio JSON-RPC server exposing the memory tools.
//!
//! [`serve_stdio`] wires the configuration and embedding provider into a
//! [`MemoryTools`] handler and runs [`serve`] over stdin/stdout. The loop reads one
//! frame at a time and answers it before reading the next.

pub mod framing;
pub mod jsonrpc;

use std::sync::Arc;

use anyhow::Result;
use rmcp::model::{
    CallToolRequestParams, EmptyObject, ErrorCode, ErrorData, Implementation, JsonObject,
    ListToolsResult, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::config::MnemoConfig;
use crate::db;
use crate::embedding;
use crate::tools::MemoryTools;
use framing::FrameError;
use jsonrpc::{Incoming, Reply};

pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V_2024_11_05;
pub const SERVER_NAME: &str = "mnemo";

/// Log a warning when the stored vectors came from a different model than the one
/// configured. Silent when no store exists yet.
pub fn check_embedding_model(config: &MnemoConfig) {
    let conn = match db::open_existing(config.resolved_db_path()) {
        Ok(conn) => conn,
        Err(db::StoreError::NotFound(_)) => return,
        Err(e) => {
            tracing::warn!(error = %e, "could not open database for model check");
            return;
        }
    };
    if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed; run `mnemo index --rebuild` to re-embed all chunks"
            );
        }
    }
}

/// Start the server over stdio.
pub async fn serve_stdio(config: MnemoConfig) -> Result<()> {
    tracing::info!(root = %config.root().display(), "starting mnemo server on stdio");

    check_embedding_model(&config);

    let provider: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding));
    tracing::info!(
        provider = %config.embedding.provider,
        model = provider.model_name(),
        "embedding provider ready"
    );

    let tools = MemoryTools::new(Arc::new(config), provider);
    serve(tools, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Serve framed requests from `reader` until end of stream.
pub async fn serve<R, W>(tools: MemoryTools, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let body = match framing::read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => break,
            Err(FrameError::Io(e)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed frame");
                continue;
            }
        };

        if let Some(response) = handle_message(&tools, &body).await {
            let bytes = serde_json::to_vec(&response)?;
            framing::write_frame(&mut writer, &bytes).await?;
        }
    }
    Ok(())
}

/// Handle one message body. Returns `None` for notifications.
pub async fn handle_message(tools: &MemoryTools, body: &[u8]) -> Option<Reply> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable request");
            return Some(Reply::error(None, ErrorData::parse_error(format!("Parse error: {e}"), None)));
        }
    };

    let request = match Incoming::from_value(&value) {
        Ok(r) => r,
        Err((id, error)) => {
            tracing::warn!(error = %error.message, "invalid request");
            return id.map(|id| Reply::error(Some(id), error));
        }
    };

    tracing::debug!(method = %request.method, id = ?request.id, "request");

    let outcome = dispatch(tools, &request.method, request.params).await;
    let id = request.id?;

    Some(match outcome {
        Dispatch::Result(result) => Reply::result(id, result),
        Dispatch::Error(error) => Reply::error(Some(id), error),
        Dispatch::NoReply => return None,
    })
}

enum Dispatch {
    Result(Value),
    Error(ErrorData),
    NoReply,
}

impl Dispatch {
    fn serialized<T: Serialize>(result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(v) => Self::Result(v),
            Err(e) => Self::Error(ErrorData::internal_error(e.to_string(), None)),
        }
    }
}

fn server_info() -> ServerInfo {
    ServerInfo {
        protocol_version: PROTOCOL_VERSION,
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: SERVER_NAME.to_string(),
            title: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            icons: None,
            website_url: None,
        },
        instructions: Some(
            "Search and maintain markdown memory. Use memory_search to recall, memory_get to read lines, \
             memory_write to record notes and memory_index after editing files by hand."
                .to_string(),
        ),
    }
}

async fn dispatch(tools: &MemoryTools, method: &str, params: JsonObject) -> Dispatch {
    match method {
        "initialize" => Dispatch::serialized(&server_info()),
        "notifications/initialized" => Dispatch::NoReply,
        "ping" => Dispatch::serialized(&EmptyObject {}),
        "tools/list" => Dispatch::serialized(&ListToolsResult::with_all_items(MemoryTools::descriptors())),
        "tools/call" => {
            let call: CallToolRequestParams = match serde_json::from_value(Value::Object(params)) {
                Ok(call) => call,
                Err(e) => {
                    return Dispatch::Error(ErrorData::invalid_params(
                        format!("tools/call requires a tool name: {e}"),
                        None,
                    ))
                }
            };
            let arguments = call.arguments.map(Value::Object).unwrap_or(Value::Null);
            tracing::info!(tool = %call.name, "tools/call");

            match tools.call_async(call.name.into_owned(), arguments).await {
                Ok(result) => Dispatch::serialized(&result),
                Err(e) => {
                    tracing::error!(error = %e, "tool dispatch failed");
                    Dispatch::Error(ErrorData::internal_error(e.to_string(), None))
                }
            }
        }
        other => Dispatch::Error(ErrorData::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
            None,
        )),
    }
}
