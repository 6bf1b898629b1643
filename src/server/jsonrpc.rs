//! JSON-RPC envelope handling on top of the `rmcp` model types.

use rmcp::model::{
    ErrorData, JsonObject, JsonRpcError, JsonRpcResponse, JsonRpcVersion2_0, RequestId,
    RequestOptionalParam,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An incoming request or notification. `id` is `None` for notifications.
#[derive(Debug)]
pub struct Incoming {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: JsonObject,
}

impl Incoming {
    /// Read the envelope of a parsed message. On failure, returns the error
    /// together with whatever id could be recovered.
    pub fn from_value(value: &Value) -> Result<Self, (Option<RequestId>, ErrorData)> {
        let id = match value.get("id") {
            None | Some(Value::Null) => None,
            Some(raw) => match RequestId::deserialize(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    return Err((None, ErrorData::invalid_request(format!("Invalid request: {e}"), None)))
                }
            },
        };

        match RequestOptionalParam::<String, JsonObject>::deserialize(value) {
            Ok(request) => Ok(Self {
                id,
                method: request.method,
                params: request.params.unwrap_or_default(),
            }),
            Err(e) => Err((id, ErrorData::invalid_request(format!("Invalid request: {e}"), None))),
        }
    }
}

/// A message written back to the client.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Result(JsonRpcResponse<Value>),
    Error(JsonRpcError),
    /// An error for a message whose id could not be read. Serialized with `"id": null`.
    Unaddressed {
        jsonrpc: JsonRpcVersion2_0,
        id: (),
        error: ErrorData,
    },
}

impl Reply {
    pub fn result(id: RequestId, result: Value) -> Self {
        Self::Result(JsonRpcResponse {
            jsonrpc: JsonRpcVersion2_0,
            id,
            result,
        })
    }

    pub fn error(id: Option<RequestId>, error: ErrorData) -> Self {
        match id {
            Some(id) => Self::Error(JsonRpcError {
                jsonrpc: JsonRpcVersion2_0,
                id,
                error,
            }),
            None => Self::Unaddressed {
                jsonrpc: JsonRpcVersion2_0,
                id: (),
                error,
            },
        }
    }
}
