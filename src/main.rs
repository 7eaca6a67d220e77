//! MCP Server Entry Point
//!
//! Reads configuration from the environment, resolves credentials and the
//! auth provider, registers tools, then runs the selected transport.
//!
//! Environment Variables:
//! - MCP_SERVER_NAME: Name of the server (default: "Remote MCP Server")
//! - MCP_TRANSPORT: "stdio", "http" or "streamable-http" (default: "streamable-http")
//! - MCP_PATH: Mount path of the MCP endpoint (default: "/mcp/")
//! - MCP_AUTH_PROVIDER: "none", "bearer" or "azure"
//! - MCP_AUTH_TOKEN: Static bearer token
//! - SECRET_NAME / AWS_REGION: Secrets Manager location of the Azure credentials
//! - HOST / PORT: Bind address for HTTP mode (default: 0.0.0.0:8000)
//! - MCP_STATELESS_HTTP: Disable HTTP sessions (default: false)
//! - ENVIRONMENT: Reported by /health (default: "unknown")

use anyhow::Context;

use remote_mcp_server::core::config::ServerConfig;
use remote_mcp_server::{build_auth, build_server, logging, transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        name = %config.name,
        transport = %config.transport,
        environment = %config.environment,
        "configuration loaded"
    );

    let auth = build_auth(&config.auth)
        .await
        .context("failed to set up authentication")?;
    let server = build_server(&config, auth).context("failed to register tools")?;

    transport::serve(server, &config).await.context("server terminated with an error")?;
    Ok(())
}
