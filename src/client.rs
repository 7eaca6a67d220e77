//! Streamable HTTP MCP client.
//!
//! Enough of a client to connect to a server, initialize a session, list and
//! call tools, and probe `/health`.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::health::HealthStatus;
use crate::core::protocol::{JsonRpcRequest, JsonRpcResponse, SUPPORTED_PROTOCOL_VERSIONS};
use crate::transport::http::SESSION_HEADER;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("server rejected credentials (status {0})")]
    Unauthorized(u16),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// Client for one streamable HTTP MCP endpoint.
///
/// Call `initialize` first; the session id the server returns is sent on
/// every later request until `close`.
pub struct McpClient {
    http: reqwest::Client,
    /// MCP endpoint URL, e.g. `http://127.0.0.1:8000/mcp/`
    url: Url,
    /// Bearer token sent in the `Authorization` header
    bearer: Option<SecretString>,
    /// Session id issued by `initialize`, if the server is stateful
    session_id: Option<String>,
    /// `serverInfo` from the initialize handshake
    server_info: Option<Value>,
    /// Next JSON-RPC request id
    next_id: u64,
}

impl McpClient {
    /// Create a client. No request is sent until `initialize`.
    ///
    /// # Arguments
    /// * `url` - Full URL of the MCP endpoint
    /// * `bearer` - Token to authenticate with, if the server requires one
    pub fn new(url: &str, bearer: Option<String>) -> ClientResult<Self> {
        let url = Url::parse(url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            url,
            bearer: bearer.map(SecretString::from),
            session_id: None,
            server_info: None,
            next_id: 1,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.server_info.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// `serverInfo` from the initialize handshake.
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    /// Perform the initialize handshake and send `notifications/initialized`.
    pub async fn initialize(&mut self) -> ClientResult<Value> {
        let params = json!({
            "protocolVersion": SUPPORTED_PROTOCOL_VERSIONS[0],
            "capabilities": {},
            "clientInfo": { "name": "mcp-client", "version": env!("CARGO_PKG_VERSION") }
        });
        let result = self.request("initialize", Some(params)).await?;
        self.server_info = Some(result.get("serverInfo").cloned().unwrap_or(Value::Null));

        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    pub async fn list_tools(&mut self) -> ClientResult<Vec<ToolInfo>> {
        let result = self.request("tools/list", None).await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| ClientError::Protocol("tools/list result has no tools".to_string()))?;
        serde_json::from_value(tools).map_err(|e| ClientError::Protocol(e.to_string()))
    }

    /// Call a tool and return the raw `tools/call` result.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> ClientResult<Value> {
        self.request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await
    }

    /// Fetch `/health` from the root of the server's URL.
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        let url = self
            .url
            .join("/health")
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let response = self.http.get(url).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// End the session on the server, if one was opened.
    pub async fn close(&mut self) -> ClientResult<()> {
        let Some(session) = self.session_id.take() else {
            return Ok(());
        };
        let response = self
            .authorized(self.http.delete(self.url.clone()))
            .header(SESSION_HEADER, session)
            .send()
            .await?;
        self.server_info = None;
        match response.status() {
            // Already gone or sessions not supported
            s if s.is_success() || s == StatusCode::NOT_FOUND || s == StatusCode::METHOD_NOT_ALLOWED => Ok(()),
            s => Err(ClientError::Status {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> ClientResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session.to_string());
        }

        let status = response.status();
        let body = response.text().await?;
        // JSON-RPC errors may arrive with a 4xx status.
        let message: JsonRpcResponse = serde_json::from_str(&body).map_err(|_| ClientError::Status {
            status: status.as_u16(),
            body: body.clone(),
        })?;

        if let Some(error) = message.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        message
            .result
            .ok_or_else(|| ClientError::Protocol(format!("{method} response has no result")))
    }

    async fn notify(&self, method: &str) -> ClientResult<()> {
        self.post(&JsonRpcRequest::notification(method)).await?;
        Ok(())
    }

    async fn post(&self, message: &JsonRpcRequest) -> ClientResult<reqwest::Response> {
        let mut builder = self
            .authorized(self.http.post(self.url.clone()))
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ClientError::Unauthorized(response.status().as_u16()))
            }
            _ => Ok(response),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_server() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mcp/"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(SESSION_HEADER, "sess-1")
                    .set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": {
                            "protocolVersion": "2025-06-18",
                            "capabilities": {"tools": {}},
                            "serverInfo": {"name": "Remote MCP Server", "version": "1.0.0"}
                        }
                    })),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/mcp/"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/mcp/"))
            .and(header(SESSION_HEADER, "sess-1"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"tools": [
                    {"name": "process_data", "description": "Process data on the server", "inputSchema": {"type": "object"}}
                ]}
            })))
            .mount(&server)
            .await;

        server
    }

    #[tokio::test]
    async fn initialize_then_list_tools() {
        let server = mock_server().await;
        let mut client = McpClient::new(&format!("{}/mcp/", server.uri()), None).unwrap();
        assert!(!client.is_connected());

        client.initialize().await.unwrap();
        assert!(client.is_connected());
        assert_eq!(client.session_id(), Some("sess-1"));
        assert_eq!(client.server_info().unwrap()["name"], "Remote MCP Server");

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "process_data");
        assert_eq!(tools[0].input_schema, json!({"type": "object"}));
    }

    #[tokio::test]
    async fn unauthorized_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut client = McpClient::new(&format!("{}/mcp/", server.uri()), Some("wrong".into())).unwrap();
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(401)));
    }

    #[tokio::test]
    async fn rpc_errors_surface_code_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "Unknown tool: nope"}
            })))
            .mount(&server)
            .await;

        let mut client = McpClient::new(&format!("{}/mcp/", server.uri()), Some("t0ken".into())).unwrap();
        let err = client.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn health_uses_the_server_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(HealthStatus::healthy("test")))
            .mount(&server)
            .await;

        let client = McpClient::new(&format!("{}/mcp/", server.uri()), None).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health, HealthStatus::healthy("test"));
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(matches!(McpClient::new("not a url", None), Err(ClientError::InvalidUrl(_))));
    }
}
