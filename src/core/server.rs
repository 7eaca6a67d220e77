//! MCP Server Instance
//!
//! `McpServer` is the process-scoped context: server identity, the optional
//! auth provider and the tool registry. It is built once at startup, tools are
//! attached, and then it is shared read-only behind an `Arc` by whichever
//! transport runs it. Request routing for the MCP methods lives here so the
//! stdio and HTTP transports share one dispatcher.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::auth::AuthProvider;
use crate::core::error::{ServerResult, ToolError};
use crate::core::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    negotiate_protocol_version,
};
use crate::core::registry::{ToolContext, ToolDescriptor, ToolRegistry};

/// Server metadata reported in `initialize` responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name as reported in MCP initialize responses
    pub name: String,
    /// Crate version
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The process-scoped server context.
///
/// Holds everything a request needs: identity, the optional auth provider and
/// the tools. Mutable only while tools are being registered.
pub struct McpServer {
    info: ServerInfo,
    auth: Option<Arc<dyn AuthProvider>>,
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(info: ServerInfo, auth: Option<Arc<dyn AuthProvider>>) -> Self {
        Self {
            info,
            auth,
            registry: ToolRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn auth(&self) -> Option<&Arc<dyn AuthProvider>> {
        self.auth.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Attach a tool.
    ///
    /// # Returns
    /// `ServerError::Registration` if a tool with the same name exists.
    pub fn register_tool(&mut self, tool: ToolDescriptor) -> ServerResult<()> {
        self.registry.register(tool)
    }

    /// Route one JSON-RPC message.
    ///
    /// # Arguments
    /// * `req` - Parsed JSON-RPC request or notification
    /// * `ctx` - Caller context; carries claims when the transport authenticated
    ///
    /// # Returns
    /// The response to send, or `None` for notifications.
    pub fn handle(&self, req: JsonRpcRequest, ctx: &ToolContext) -> Option<JsonRpcResponse> {
        if req.is_notification() {
            tracing::debug!(method = %req.method, "notification received");
            return None;
        }

        let id = req.id.clone();
        if req.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", req.jsonrpc),
            ));
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(id, req.params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, req.params, ctx),
            method => {
                tracing::debug!(%method, "method not found");
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
            }
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = negotiate_protocol_version(requested);

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": version,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": self.info.name,
                    "version": self.info.version
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.registry.definitions() }))
    }

    fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>, ctx: &ToolContext) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, "Invalid params");
        };

        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, "Invalid params: missing tool name");
        };

        let Some(tool) = self.registry.get(tool_name) else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Unknown tool: {tool_name}"));
        };

        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        match tool.call(ctx, arguments) {
            Ok(result) => {
                tracing::debug!(tool = %tool_name, "tool call succeeded");
                JsonRpcResponse::success(id, tool_result(&result, tool.definition.output_schema.is_some()))
            }
            Err(err) => {
                tracing::info!(tool = %tool_name, error = %err, "tool call failed");
                JsonRpcResponse::success(id, tool_error(&err))
            }
        }
    }
}

/// Format a successful handler result as MCP tool-call content.
///
/// Strings are sent as-is; anything else is sent as its JSON text, and also as
/// `structuredContent` when the tool declares an output schema.
fn tool_result(result: &Value, structured: bool) -> Value {
    let text = match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut body = json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false
    });
    if structured && result.is_object() {
        body["structuredContent"] = result.clone();
    }
    body
}

fn tool_error(err: &ToolError) -> Value {
    json!({
        "content": [{ "type": "text", "text": format!("Error: {err}") }],
        "isError": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::METHOD_NOT_FOUND;
    use crate::core::registry::object_schema;

    fn server() -> McpServer {
        let mut server = McpServer::new(ServerInfo::new("Test Server"), None);
        server
            .register_tool(ToolDescriptor::new(
                "shout",
                "Upper-case a word",
                object_schema(json!({"word": {"type": "string"}}), &["word"]),
                |_, args| {
                    let word = args
                        .get("word")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ToolError::InvalidArguments("word is required".into()))?;
                    Ok(Value::String(word.to_uppercase()))
                },
            ))
            .unwrap();
        server
            .register_tool(
                ToolDescriptor::new("stats", "Object result", object_schema(json!({}), &[]), |_, _| {
                    Ok(json!({"n": 1}))
                })
                .with_output_schema(object_schema(json!({"n": {"type": "integer"}}), &["n"])),
            )
            .unwrap();
        server
    }

    fn call(server: &McpServer, method: &str, params: Option<Value>) -> JsonRpcResponse {
        server
            .handle(JsonRpcRequest::new(1, method, params), &ToolContext::anonymous())
            .expect("requests get a response")
    }

    #[test]
    fn initialize_reports_server_info() {
        let resp = call(&server(), "initialize", Some(json!({"protocolVersion": "2025-03-26"})));
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "Test Server");
        assert_eq!(result["serverInfo"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn tools_list_uses_mcp_field_names() {
        let resp = call(&server(), "tools/list", None);
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "shout");
        assert!(tools[0].get("inputSchema").is_some());
        assert!(tools[1].get("outputSchema").is_some());
    }

    #[test]
    fn tools_call_returns_text_content() {
        let resp = call(&server(), "tools/call", Some(json!({"name": "shout", "arguments": {"word": "hi"}})));
        assert_eq!(
            resp.result.unwrap(),
            json!({"content": [{"type": "text", "text": "HI"}], "isError": false})
        );
    }

    #[test]
    fn structured_content_follows_output_schema() {
        let resp = call(&server(), "tools/call", Some(json!({"name": "stats"})));
        let result = resp.result.unwrap();
        assert_eq!(result["structuredContent"], json!({"n": 1}));
        assert_eq!(result["content"][0]["text"], "{\"n\":1}");
    }

    #[test]
    fn handler_errors_become_error_results() {
        let resp = call(&server(), "tools/call", Some(json!({"name": "shout", "arguments": {}})));
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Error: invalid arguments: word is required");
    }

    #[test]
    fn unknown_tool_and_missing_params_are_invalid_params() {
        let unknown = call(&server(), "tools/call", Some(json!({"name": "nope"})));
        assert_eq!(unknown.error.unwrap().code, INVALID_PARAMS);

        let missing = call(&server(), "tools/call", None);
        assert_eq!(missing.error.unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let resp = call(&server(), "resources/list", None);
        let err = resp.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert_eq!(err.message, "Method not found: resources/list");
    }

    #[test]
    fn notifications_get_no_response() {
        let req = JsonRpcRequest::notification("notifications/initialized");
        assert!(server().handle(req, &ToolContext::anonymous()).is_none());
    }

    #[test]
    fn wrong_jsonrpc_version_is_invalid_request() {
        let mut req = JsonRpcRequest::new(3, "ping", None);
        req.jsonrpc = "1.0".to_string();
        let resp = server().handle(req, &ToolContext::anonymous()).unwrap();
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn ping_returns_empty_object() {
        assert_eq!(call(&server(), "ping", None).result, Some(json!({})));
    }
}
