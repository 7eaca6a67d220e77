//! MCP client: connects to a streamable HTTP server and lists its tools.
//!
//! Environment Variables:
//! - MCP_SERVER_URL: MCP endpoint (default: "http://127.0.0.1:8000/mcp/")
//! - MCP_AUTH_TOKEN: Bearer token to send, if the server requires one

use anyhow::Context;

use remote_mcp_server::client::McpClient;
use remote_mcp_server::logging;

const DEFAULT_URL: &str = "http://127.0.0.1:8000/mcp/";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let url = std::env::var("MCP_SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let token = std::env::var("MCP_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

    let mut client = McpClient::new(&url, token)?;
    client
        .initialize()
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    println!("Connected: {}", client.is_connected());

    for tool in client.list_tools().await.context("tools/list failed")? {
        println!("{}: {}", tool.name, tool.description);
        println!("  input schema: {}", tool.input_schema);
    }

    client.close().await?;
    Ok(())
}
