//! JSON-RPC 2.0 message types for the MCP protocol.
//!
//! All MCP requests follow the JSON-RPC 2.0 specification. A request without
//! an `id` is a notification and never gets a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct JsonRpcRequest {
    /// JSON-RPC version identifier, must be "2.0"
    pub jsonrpc: String,
    /// Request ID for correlating responses. None indicates a notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    pub method: String,
    /// Method-specific parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Request ID from the original request; null when it could not be read
    pub id: Option<Value>,
    /// Present when the request succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Decode one raw JSON-RPC message.
///
/// On failure returns the error response to send back: `-32700` when the
/// bytes are not JSON, `-32600` when the JSON is not a single request.
pub fn parse_request(raw: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| JsonRpcResponse::failure(None, PARSE_ERROR, format!("Parse error: {e}")))?;

    if value.is_array() {
        return Err(JsonRpcResponse::failure(None, INVALID_REQUEST, "Batch requests are not supported"));
    }

    let id = value.get("id").cloned();
    serde_json::from_value(value)
        .map_err(|e| JsonRpcResponse::failure(id, INVALID_REQUEST, format!("Invalid request: {e}")))
}

/// Pick the protocol version to answer `initialize` with.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|r| SUPPORTED_PROTOCOL_VERSIONS.iter().copied().find(|v| *v == r))
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}
