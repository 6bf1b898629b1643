mod helpers;

use std::sync::Arc;

use helpers::{HashEmbedder, Workspace};
use mnemo::server::{self, framing};
use mnemo::tools::MemoryTools;
use serde_json::{json, Value};

fn frame(message: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(message).unwrap();
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend(body);
    out
}

/// Feed `messages` through the server loop and collect every response.
async fn exchange(ws: &Workspace, messages: &[Value]) -> Vec<Value> {
    let input: Vec<u8> = messages.iter().flat_map(frame).collect();
    let tools = MemoryTools::new(Arc::new(ws.config.clone()), Arc::new(HashEmbedder));

    let mut output = Vec::new();
    server::serve(tools, &input[..], &mut output).await.unwrap();

    let mut reader = &output[..];
    let mut responses = Vec::new();
    while let Some(body) = framing::read_frame(&mut reader).await.unwrap() {
        responses.push(serde_json::from_slice(&body).unwrap());
    }
    responses
}

fn call(id: u64, tool: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments },
    })
}

/// The JSON payload inside a tools/call result, plus its isError flag.
fn payload(response: &Value) -> (Value, bool) {
    let result = &response["result"];
    let text = result["content"][0]["text"].as_str().unwrap();
    let parsed = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
    (parsed, result["isError"].as_bool().unwrap())
}

#[tokio::test]
async fn handshake_and_tool_listing() {
    let ws = Workspace::new();
    let responses = exchange(
        &ws,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ],
    )
    .await;

    // the notification gets no reply
    assert_eq!(responses.len(), 2);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["protocolVersion"], server::PROTOCOL_VERSION.to_string());
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "mnemo");
    assert!(responses[0]["result"]["capabilities"]["tools"].is_object());

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["memory_search", "memory_get", "memory_index", "memory_write"]);
    for tool in tools {
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
    let search_schema = &tools[0]["inputSchema"];
    assert_eq!(search_schema["required"], json!(["query"]));
    assert!(search_schema["properties"]["maxResults"].is_object());
    assert_eq!(tools[0]["annotations"]["readOnlyHint"], true);
    assert!(tools[3].get("annotations").is_none());
}

#[tokio::test]
async fn protocol_errors_use_jsonrpc_codes() {
    let ws = Workspace::new();
    let mut input = b"Content-Length: 9\r\n\r\n{not json".to_vec();
    for message in [
        json!({"jsonrpc": "2.0", "id": 7, "method": "resources/list"}),
        json!({"jsonrpc": "2.0", "id": 8, "method": "tools/call", "params": {}}),
        json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}),
    ] {
        input.extend(frame(&message));
    }

    let tools = MemoryTools::new(Arc::new(ws.config.clone()), Arc::new(HashEmbedder));
    let mut output = Vec::new();
    server::serve(tools, &input[..], &mut output).await.unwrap();

    let mut reader = &output[..];
    let mut responses: Vec<Value> = Vec::new();
    while let Some(body) = framing::read_frame(&mut reader).await.unwrap() {
        responses.push(serde_json::from_slice(&body).unwrap());
    }

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[1]["id"], 7);
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[1]["error"]["message"], "Method not found: resources/list");
    assert_eq!(responses[2]["error"]["code"], -32602);
    assert_eq!(responses[3]["result"], json!({}));
}

#[tokio::test]
async fn hostile_headers_do_not_stop_the_server() {
    let ws = Workspace::new();
    let mut input = b"Content-Length: 18446744073709551615\r\n\r\n".to_vec();
    input.extend(b"Content-Type: \xc3\x28 broken\r\n\r\n");
    input.extend(frame(&json!({"jsonrpc": "2.0", "id": "after", "method": "ping"})));

    let tools = MemoryTools::new(Arc::new(ws.config.clone()), Arc::new(HashEmbedder));
    let mut output = Vec::new();
    server::serve(tools, &input[..], &mut output).await.unwrap();

    let mut reader = &output[..];
    let body = framing::read_frame(&mut reader).await.unwrap().unwrap();
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["id"], "after");
    assert_eq!(response["result"], json!({}));
    assert!(framing::read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn memory_get_clamps_to_file_end() {
    let ws = Workspace::new();
    let text: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
    ws.write("memory/2026-03-01.md", &(text.join("\n") + "\n"));

    let responses = exchange(
        &ws,
        &[
            call(1, "memory_get", json!({"path": "memory/2026-03-01.md", "from": 8, "lines": 50})),
            call(2, "memory_get", json!({"path": "memory/2026-03-01.md", "from": 2.0, "lines": 2})),
            call(3, "memory_get", json!({"path": "memory/missing.md"})),
            call(4, "memory_get", json!({"path": "../outside.md"})),
            call(5, "memory_get", json!({"path": "memory/2026-03-01.md", "from": 20})),
        ],
    )
    .await;

    let (window, is_error) = payload(&responses[0]);
    assert!(!is_error);
    assert_eq!(window["from"], 8);
    assert_eq!(window["to"], 10);
    assert_eq!(window["content"], "line 8\nline 9\nline 10");

    let (window, _) = payload(&responses[1]);
    assert_eq!(window["content"], "line 2\nline 3");

    let (missing, is_error) = payload(&responses[2]);
    assert!(is_error);
    assert!(missing["error"].as_str().unwrap().contains("not found"));

    let (_, is_error) = payload(&responses[3]);
    assert!(is_error);

    let (past_end, is_error) = payload(&responses[4]);
    assert!(!is_error);
    assert_eq!(past_end["from"], 20);
    assert_eq!(past_end["to"], 19);
    assert_eq!(past_end["content"], "");
}

#[tokio::test]
async fn write_then_index_then_search() {
    let ws = Workspace::new();
    ws.write("MEMORY.md", "# Long-term\n\nThe staging database lives in Frankfurt.\n\n---\nfooter\n");

    let responses = exchange(
        &ws,
        &[
            call(1, "memory_search", json!({"query": "Frankfurt"})),
            call(2, "memory_write", json!({"target": "longterm", "content": "Deploys freeze on Fridays."})),
            call(3, "memory_write", json!({"content": "Paired on the Frankfurt migration."})),
            call(4, "memory_index", json!({})),
            call(5, "memory_search", json!({"query": "Frankfurt migration", "maxResults": 1, "minScore": 0.0})),
        ],
    )
    .await;
    assert_eq!(responses.len(), 5);

    // no store yet
    let (missing, is_error) = payload(&responses[0]);
    assert!(is_error);
    assert!(missing["error"].as_str().unwrap().contains("mnemo index"));

    let (written, is_error) = payload(&responses[1]);
    assert!(!is_error);
    assert_eq!(written["success"], true);
    assert_eq!(written["path"], "MEMORY.md");
    let memory = ws.read("MEMORY.md");
    let fact = memory.find("Deploys freeze").unwrap();
    assert!(fact < memory.rfind("---").unwrap());

    let (daily, _) = payload(&responses[2]);
    let daily_path = daily["path"].as_str().unwrap().to_string();
    assert!(daily_path.starts_with("memory/"));
    assert!(ws.read(&daily_path).contains("Paired on the Frankfurt migration."));

    let (indexed, is_error) = payload(&responses[3]);
    assert!(!is_error);
    assert_eq!(indexed["success"], true);
    assert!(indexed["output"].as_str().unwrap().contains("Total chunks in database: 2"));

    let (found, is_error) = payload(&responses[4]);
    assert!(!is_error);
    let results = found["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["file_path"], daily_path);
    assert!(results[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn tool_argument_errors_are_flagged() {
    let ws = Workspace::new();
    let responses = exchange(
        &ws,
        &[
            call(1, "memory_search", json!({"query": "  "})),
            call(2, "memory_search", json!({"max_results": 3})),
            call(3, "memory_write", json!({"target": "weekly", "content": "x"})),
            call(4, "memory_write", json!({"content": ""})),
            call(5, "memory_forget", json!({})),
        ],
    )
    .await;

    let (empty, is_error) = payload(&responses[0]);
    assert!(is_error);
    assert_eq!(empty["error"], "Query is required");

    let (_, is_error) = payload(&responses[1]);
    assert!(is_error);

    let (bad_target, is_error) = payload(&responses[2]);
    assert!(is_error);
    assert!(bad_target["error"].as_str().unwrap().starts_with("Invalid arguments"));

    let (empty, is_error) = payload(&responses[3]);
    assert!(is_error);
    assert_eq!(empty["error"], "Content is required");

    let (unknown, is_error) = payload(&responses[4]);
    assert!(is_error);
    assert_eq!(unknown, Value::String("Unknown tool: memory_forget".into()));
}
